//! SQLite table definitions
//!
//! One table per game, named `<game>_draws`, with one INTEGER column per
//! ball (`red1..red6`, `blue1`, ...). Everything is `IF NOT EXISTS` so the
//! statements run on every open.

use crate::game::GameSchema;

/// Ball column names of `schema`, in storage order.
pub fn ball_columns(schema: &GameSchema) -> Vec<String> {
    schema
        .groups
        .iter()
        .flat_map(|group| (0..group.count).map(move |i| group.column(i)))
        .collect()
}

/// DDL for the draw table of `schema`.
pub fn table_ddl(schema: &GameSchema) -> String {
    let table = schema.table_name();
    let balls: String = ball_columns(schema)
        .iter()
        .map(|col| format!("    {col} INTEGER NOT NULL,\n"))
        .collect();

    format!(
        r#"
-- ============================================
-- {name} DRAWS
-- ============================================

CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY,                -- numeric issue_id, orders the table
    issue_id TEXT UNIQUE NOT NULL,         -- 7 digit issue number, e.g. '2025068'
    draw_date TEXT NOT NULL,               -- YYYY-MM-DD
{balls}    sorted_code TEXT NOT NULL,             -- '01,05,09,20,35-02,12'
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_{table}_draw_date ON {table}(draw_date);
CREATE INDEX IF NOT EXISTS idx_{table}_sorted_code ON {table}(sorted_code);
"#,
        name = schema.id.key().to_uppercase(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameId;

    #[test]
    fn test_ball_columns() {
        assert_eq!(
            ball_columns(&GameId::Ssq.schema()),
            vec!["red1", "red2", "red3", "red4", "red5", "red6", "blue1"]
        );
        assert_eq!(
            ball_columns(&GameId::Qlc.schema()).last().map(String::as_str),
            Some("special1")
        );
    }

    #[test]
    fn test_ddl_is_idempotent() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        for id in GameId::ALL {
            let ddl = table_ddl(&id.schema());
            conn.execute_batch(&ddl).unwrap();
            conn.execute_batch(&ddl).unwrap();
        }
    }

    #[test]
    fn test_id_is_not_autoincrement() {
        let ddl = table_ddl(&GameId::Ssq.schema());
        assert!(ddl.contains("id INTEGER PRIMARY KEY,"));
        assert!(!ddl.contains("AUTOINCREMENT"));
    }
}
