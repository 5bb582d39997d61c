//! Executes scoped queries against an in-memory DuckDB holding two tenants and
//! checks that only the caller's rows contribute to the result.

use duckdb::Connection;
use nlq_studio::nlq::secure_query_for_tenant;

const TENANT: &str = "tid-42";
const OTHER: &str = "tid-7";

fn fixture() -> Connection {
    let conn = Connection::open_in_memory().expect("in-memory database");
    conn.execute_batch(
        r#"
        CREATE TABLE "SalesAccount" (id INTEGER, name VARCHAR, "tenantId" VARCHAR);
        CREATE TABLE "SalesOpportunity" (
            id INTEGER, "accountId" INTEGER, amount BIGINT, status VARCHAR, "tenantId" VARCHAR
        );
        CREATE TABLE "SalesContact" (id INTEGER, "accountId" INTEGER, email VARCHAR, "tenantId" VARCHAR);

        INSERT INTO "SalesAccount" VALUES
            (1, 'Acme', 'tid-42'),
            (2, 'Globex', 'tid-42'),
            (3, 'Initech', 'tid-7');

        -- opportunity 5 belongs to tid-7 but points at a tid-42 account
        INSERT INTO "SalesOpportunity" VALUES
            (1, 1, 100, 'won', 'tid-42'),
            (2, 1, 50, 'open', 'tid-42'),
            (3, 2, 70, 'won', 'tid-42'),
            (4, 3, 500, 'won', 'tid-7'),
            (5, 1, 999, 'won', 'tid-7');

        -- contact 3 belongs to tid-7 but points at a tid-42 account
        INSERT INTO "SalesContact" VALUES
            (1, 1, 'ana@acme.test', 'tid-42'),
            (2, 3, 'bo@initech.test', 'tid-7'),
            (3, 2, 'cy@globex.test', 'tid-7');
        "#,
    )
    .expect("fixture schema and rows");
    conn
}

fn scalar(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0))
        .unwrap_or_else(|e| panic!("query failed: {e}\n{sql}"))
}

/// Run `sql` unscoped and scoped to `TENANT`; returns (unscoped, scoped).
fn compare(conn: &Connection, sql: &str) -> (i64, i64) {
    let scoped = secure_query_for_tenant(sql, TENANT).expect("query can be scoped");
    (scalar(conn, sql), scalar(conn, &scoped))
}

#[test]
fn single_table_filter() {
    let conn = fixture();
    let (all, scoped) = compare(
        &conn,
        "SELECT COUNT(*) FROM \"SalesOpportunity\" WHERE status = 'won'",
    );
    assert_eq!(all, 4);
    assert_eq!(scoped, 2);
}

#[test]
fn inner_join_filters_both_sides() {
    let conn = fixture();
    let (all, scoped) = compare(
        &conn,
        "SELECT CAST(SUM(o.amount) AS BIGINT) FROM \"SalesOpportunity\" o \
         JOIN \"SalesAccount\" a ON a.id = o.\"accountId\"",
    );
    assert_eq!(all, 1719);
    assert_eq!(scoped, 220);
}

#[test]
fn left_join_keeps_unmatched_rows() {
    let conn = fixture();
    let sql = "SELECT a.name, COUNT(c.id) FROM \"SalesAccount\" a \
               LEFT JOIN \"SalesContact\" c ON c.\"accountId\" = a.id \
               GROUP BY a.name ORDER BY a.name";
    let scoped = secure_query_for_tenant(sql, TENANT).unwrap();

    let mut stmt = conn.prepare(&scoped).unwrap();
    let rows: Vec<(String, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(
        rows,
        vec![("Acme".to_string(), 1), ("Globex".to_string(), 0)]
    );
}

#[test]
fn subqueries_are_filtered() {
    let conn = fixture();

    let (all, scoped) = compare(
        &conn,
        "SELECT COUNT(*) FROM \"SalesAccount\" WHERE id IN \
         (SELECT \"accountId\" FROM \"SalesOpportunity\" WHERE amount > 500)",
    );
    assert_eq!(all, 1);
    assert_eq!(scoped, 0);

    let (all, scoped) = compare(
        &conn,
        "SELECT COUNT(*) FROM \"SalesAccount\" a WHERE EXISTS \
         (SELECT 1 FROM \"SalesContact\" c WHERE c.\"accountId\" = a.id)",
    );
    assert_eq!(all, 3);
    assert_eq!(scoped, 1);

    let (all, scoped) = compare(
        &conn,
        "SELECT (SELECT MAX(amount) FROM \"SalesOpportunity\") AS top_amount",
    );
    assert_eq!(all, 999);
    assert_eq!(scoped, 100);
}

#[test]
fn ctes_unions_and_derived_tables_are_filtered() {
    let conn = fixture();
    let (all, scoped) = compare(
        &conn,
        "WITH won AS (SELECT \"accountId\" FROM \"SalesOpportunity\" WHERE status = 'won') \
         SELECT COUNT(*) FROM (SELECT \"accountId\" FROM won \
         UNION ALL SELECT \"accountId\" FROM \"SalesContact\") t",
    );
    assert_eq!(all, 7);
    assert_eq!(scoped, 3);
}

#[test]
fn or_predicates_cannot_escape_the_filter() {
    let conn = fixture();
    let (all, scoped) = compare(
        &conn,
        "SELECT COUNT(*) FROM \"SalesOpportunity\" WHERE status = 'open' OR 1 = 1",
    );
    assert_eq!(all, 5);
    assert_eq!(scoped, 3);
}

#[test]
fn each_tenant_sees_only_its_rows() {
    let conn = fixture();
    let sql = "SELECT COUNT(*) FROM \"SalesAccount\"";

    let mine = secure_query_for_tenant(sql, TENANT).unwrap();
    let theirs = secure_query_for_tenant(sql, OTHER).unwrap();
    assert_eq!(scalar(&conn, &mine), 2);
    assert_eq!(scalar(&conn, &theirs), 1);

    let rescoped = secure_query_for_tenant(&mine, TENANT).unwrap();
    assert_eq!(rescoped, mine);
}
