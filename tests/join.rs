use flatsql::{DbError, Session, Value};

fn setup() -> (tempfile::TempDir, Session) {
    let dir = tempfile::tempdir().unwrap();
    let mut session = Session::new(dir.path());
    session.execute("CREATE DATABASE testdb").unwrap();
    (dir, session)
}

#[test]
fn inner_join_keeps_matching_pairs_only() {
    let (_dir, mut session) = setup();
    session
        .execute(
            "CREATE TABLE a (id integer primary_key, x integer);
             CREATE TABLE b (id integer primary_key, y integer);
             INSERT INTO a (id, x) VALUES (1, 10);
             INSERT INTO a (id, x) VALUES (2, 20);
             INSERT INTO b (id, y) VALUES (1, 100);
             INSERT INTO b (id, y) VALUES (3, 300)",
        )
        .unwrap();
    let results = session
        .execute("SELECT a.x, b.y FROM a INNER JOIN b ON a.id = b.id")
        .unwrap();
    assert_eq!(results[0].schema, vec!["a.x", "b.y"]);
    assert_eq!(
        results[0].rows,
        vec![vec![Value::Integer(10), Value::Integer(100)]]
    );
}

#[test]
fn join_produces_every_matching_combination() {
    let (_dir, mut session) = setup();
    session
        .execute(
            "CREATE TABLE users (id integer primary_key, name string);
             CREATE TABLE orders (id integer primary_key, user_id integer, product string);
             INSERT INTO users (id, name) VALUES (1, 'Alice');
             INSERT INTO users (id, name) VALUES (2, 'Bob');
             INSERT INTO users (id, name) VALUES (3, 'Charlie');
             INSERT INTO orders (id, user_id, product) VALUES (101, 1, 'Laptop');
             INSERT INTO orders (id, user_id, product) VALUES (102, 1, 'Mouse');
             INSERT INTO orders (id, user_id, product) VALUES (103, 2, 'Keyboard')",
        )
        .unwrap();
    let results = session
        .execute(
            "SELECT users.name, orders.product FROM users \
             INNER JOIN orders ON users.id = orders.user_id",
        )
        .unwrap();
    let rows = &results[0].rows;
    assert_eq!(rows.len(), 3);
    assert!(rows.contains(&vec![
        Value::Text("Alice".to_string()),
        Value::Text("Laptop".to_string()),
    ]));
    assert!(rows.contains(&vec![
        Value::Text("Alice".to_string()),
        Value::Text("Mouse".to_string()),
    ]));
    assert!(rows.contains(&vec![
        Value::Text("Bob".to_string()),
        Value::Text("Keyboard".to_string()),
    ]));
    assert!(!rows
        .iter()
        .any(|row| row[0] == Value::Text("Charlie".to_string())));
}

#[test]
fn chained_joins_apply_in_written_order() {
    let (_dir, mut session) = setup();
    session
        .execute(
            "CREATE TABLE a (id integer primary_key);
             CREATE TABLE b (a_id integer, c_id integer);
             CREATE TABLE c (id integer primary_key, tag string);
             INSERT INTO a (id) VALUES (1);
             INSERT INTO a (id) VALUES (2);
             INSERT INTO b (a_id, c_id) VALUES (1, 7);
             INSERT INTO b (a_id, c_id) VALUES (2, 9);
             INSERT INTO c (id, tag) VALUES (7, 'seven');
             INSERT INTO c (id, tag) VALUES (8, 'eight')",
        )
        .unwrap();
    let results = session
        .execute(
            "SELECT a.id, c.tag FROM a \
             INNER JOIN b ON a.id = b.a_id \
             INNER JOIN c ON b.c_id = c.id",
        )
        .unwrap();
    // Only a=1 survives both conditions: b maps it to c_id 7, which c has.
    assert_eq!(
        results[0].rows,
        vec![vec![Value::Integer(1), Value::Text("seven".to_string())]]
    );
}

#[test]
fn string_columns_join_too() {
    let (_dir, mut session) = setup();
    session
        .execute(
            "CREATE TABLE l (k string);
             CREATE TABLE r (k string, v integer);
             INSERT INTO l (k) VALUES ('red');
             INSERT INTO r (k, v) VALUES ('red', 1);
             INSERT INTO r (k, v) VALUES ('blue', 2)",
        )
        .unwrap();
    let results = session
        .execute("SELECT l.k, r.v FROM l INNER JOIN r ON l.k = r.k")
        .unwrap();
    assert_eq!(
        results[0].rows,
        vec![vec![Value::Text("red".to_string()), Value::Integer(1)]]
    );
}

#[test]
fn cross_type_join_is_rejected() {
    let (_dir, mut session) = setup();
    session
        .execute(
            "CREATE TABLE a (x integer);
             CREATE TABLE b (y string)",
        )
        .unwrap();
    assert!(matches!(
        session.execute("SELECT a.x, b.y FROM a INNER JOIN b ON a.x = b.y"),
        Err(DbError::JoinTypeMismatch(_, _))
    ));
}

#[test]
fn joining_an_empty_table_yields_no_rows() {
    let (_dir, mut session) = setup();
    session
        .execute(
            "CREATE TABLE a (id integer);
             CREATE TABLE b (id integer);
             INSERT INTO a (id) VALUES (1)",
        )
        .unwrap();
    let results = session
        .execute("SELECT a.id, b.id FROM a INNER JOIN b ON a.id = b.id")
        .unwrap();
    assert!(results[0].rows.is_empty());
}

#[test]
fn join_against_a_missing_table_fails() {
    let (_dir, mut session) = setup();
    session.execute("CREATE TABLE a (id integer)").unwrap();
    assert!(matches!(
        session.execute("SELECT a.id FROM a INNER JOIN ghost ON a.id = ghost.id"),
        Err(DbError::TableNotFound(_))
    ));
}

#[test]
fn join_columns_must_exist() {
    let (_dir, mut session) = setup();
    session
        .execute(
            "CREATE TABLE a (id integer);
             CREATE TABLE b (id integer)",
        )
        .unwrap();
    assert!(matches!(
        session.execute("SELECT a.id FROM a INNER JOIN b ON a.ghost = b.id"),
        Err(DbError::ColumnNotFound { .. })
    ));
}
