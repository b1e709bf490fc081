//! SQLite schema and queries.
//!
//! Plain synchronous functions over a borrowed [`rusqlite::Connection`];
//! [`crate::FaceStore`] runs them on the connection's worker thread.

use crate::types::{FaceRecord, FaceWithUser, NewFace, NewSummary, Stats, SummaryRecord, User};
use rusqlite::{params, Connection, OptionalExtension, Row};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS face_data (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL REFERENCES users(id),
    face_path   TEXT,
    vector_path TEXT,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_face_data_user ON face_data(user_id);
CREATE TABLE IF NOT EXISTS summary_history (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    original_text TEXT,
    summary       TEXT,
    model_used    TEXT,
    summary_style TEXT,
    word_count    INTEGER,
    created_at    TEXT NOT NULL
);
";

/// Create tables if missing and enable foreign keys.
pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn face_from_row(row: &Row<'_>) -> rusqlite::Result<FaceRecord> {
    Ok(FaceRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        face_path: row.get(2)?,
        vector_path: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<SummaryRecord> {
    Ok(SummaryRecord {
        id: row.get(0)?,
        original_text: row.get(1)?,
        summary: row.get(2)?,
        model_used: row.get(3)?,
        summary_style: row.get(4)?,
        word_count: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn get_user_by_name(conn: &Connection, name: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT id, name, created_at FROM users WHERE name = ?1",
        params![name],
        user_from_row,
    )
    .optional()
}

pub fn create_user(conn: &Connection, name: &str) -> rusqlite::Result<User> {
    conn.query_row(
        "INSERT INTO users (name, created_at) VALUES (?1, ?2)
         RETURNING id, name, created_at",
        params![name, now()],
        user_from_row,
    )
}

/// Look a user up by name, creating it on first sight.
pub fn get_or_create_user(conn: &mut Connection, name: &str) -> rusqlite::Result<User> {
    let tx = conn.transaction()?;
    let user = match get_user_by_name(&tx, name)? {
        Some(user) => user,
        None => create_user(&tx, name)?,
    };
    tx.commit()?;
    Ok(user)
}

pub fn create_face(conn: &Connection, face: &NewFace) -> rusqlite::Result<FaceRecord> {
    conn.query_row(
        "INSERT INTO face_data (user_id, face_path, vector_path, created_at)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING id, user_id, face_path, vector_path, created_at",
        params![face.user_id, face.face_path, face.vector_path, now()],
        face_from_row,
    )
}

/// Every face row with its owner, oldest first.
pub fn all_faces(conn: &Connection) -> rusqlite::Result<Vec<FaceWithUser>> {
    let mut stmt = conn.prepare(
        "SELECT f.id, f.user_id, f.face_path, f.vector_path, f.created_at,
                u.id, u.name, u.created_at
         FROM face_data f
         INNER JOIN users u ON u.id = f.user_id
         ORDER BY f.id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(FaceWithUser {
            face: face_from_row(row)?,
            user: User {
                id: row.get(5)?,
                name: row.get(6)?,
                created_at: row.get(7)?,
            },
        })
    })?;
    rows.collect()
}

pub fn create_summary(conn: &Connection, summary: &NewSummary) -> rusqlite::Result<SummaryRecord> {
    conn.query_row(
        "INSERT INTO summary_history
            (original_text, summary, model_used, summary_style, word_count, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING id, original_text, summary, model_used, summary_style, word_count, created_at",
        params![
            summary.original_text,
            summary.summary,
            summary.model_used,
            summary.summary_style,
            summary.word_count,
            now()
        ],
        summary_from_row,
    )
}

pub fn all_summaries(conn: &Connection) -> rusqlite::Result<Vec<SummaryRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, original_text, summary, model_used, summary_style, word_count, created_at
         FROM summary_history
         ORDER BY id",
    )?;
    let rows = stmt.query_map([], summary_from_row)?;
    rows.collect()
}

pub fn stats(conn: &Connection) -> rusqlite::Result<Stats> {
    let faces: i64 = conn.query_row("SELECT COUNT(*) FROM face_data", [], |r| r.get(0))?;
    let summaries: i64 = conn.query_row("SELECT COUNT(*) FROM summary_history", [], |r| r.get(0))?;
    Ok(Stats {
        total_faces: faces as u64,
        total_summaries: summaries as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn summary(text: &str) -> NewSummary {
        NewSummary {
            original_text: text.into(),
            summary: "short".into(),
            model_used: "gemini-2.5-flash".into(),
            summary_style: "concise".into(),
            word_count: 1,
        }
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = open();
        migrate(&conn).unwrap();
    }

    #[test]
    fn test_get_or_create_user_reuses_row() {
        let mut conn = open();
        let a = get_or_create_user(&mut conn, "ada").unwrap();
        let b = get_or_create_user(&mut conn, "ada").unwrap();
        assert_eq!(a, b);
        let c = get_or_create_user(&mut conn, "grace").unwrap();
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_user_names_are_unique() {
        let conn = open();
        create_user(&conn, "ada").unwrap();
        assert!(create_user(&conn, "ada").is_err());
    }

    #[test]
    fn test_get_missing_user() {
        let conn = open();
        assert!(get_user_by_name(&conn, "nobody").unwrap().is_none());
    }

    #[test]
    fn test_faces_join_users() {
        let mut conn = open();
        let ada = get_or_create_user(&mut conn, "ada").unwrap();
        let grace = get_or_create_user(&mut conn, "grace").unwrap();
        for (user, file) in [(&ada, "1_1"), (&grace, "2_2"), (&ada, "1_3")] {
            create_face(
                &conn,
                &NewFace {
                    user_id: user.id,
                    face_path: Some(format!("{file}.jpg")),
                    vector_path: Some(format!("{file}.json")),
                },
            )
            .unwrap();
        }

        let faces = all_faces(&conn).unwrap();
        assert_eq!(faces.len(), 3);
        assert_eq!(faces[0].user.name, "ada");
        assert_eq!(faces[1].user.name, "grace");
        assert_eq!(faces[2].face.face_path.as_deref(), Some("1_3.jpg"));
        assert_eq!(faces[2].face.user_id, ada.id);
    }

    #[test]
    fn test_face_requires_existing_user() {
        let conn = open();
        let err = create_face(
            &conn,
            &NewFace {
                user_id: 42,
                face_path: None,
                vector_path: None,
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_summaries_roundtrip_and_stats() {
        let mut conn = open();
        assert_eq!(
            stats(&conn).unwrap(),
            Stats {
                total_faces: 0,
                total_summaries: 0
            }
        );

        let row = create_summary(&conn, &summary("long text")).unwrap();
        assert_eq!(row.original_text.as_deref(), Some("long text"));
        assert_eq!(row.word_count, Some(1));
        create_summary(&conn, &summary("more text")).unwrap();

        let user = get_or_create_user(&mut conn, "ada").unwrap();
        create_face(
            &conn,
            &NewFace {
                user_id: user.id,
                face_path: None,
                vector_path: None,
            },
        )
        .unwrap();

        let all = all_summaries(&conn).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(
            stats(&conn).unwrap(),
            Stats {
                total_faces: 1,
                total_summaries: 2
            }
        );
    }

    #[test]
    fn test_face_json_shape() {
        let row = FaceWithUser {
            face: FaceRecord {
                id: 1,
                user_id: 2,
                face_path: Some("2_10.jpg".into()),
                vector_path: Some("2_10.json".into()),
                created_at: "t".into(),
            },
            user: User {
                id: 2,
                name: "ada".into(),
                created_at: "t".into(),
            },
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["userId"], 2);
        assert_eq!(json["facePath"], "2_10.jpg");
        assert_eq!(json["user"]["name"], "ada");
    }
}
