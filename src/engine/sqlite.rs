use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};
use tracing::{debug, info, instrument};

use super::StudentStore;
use crate::{GradeDto, Result, StudentDbError, StudentDto};

// name of the database file kept in the working dir
const DB_FILE: &str = "students.sqlite3";

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS students(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        index_number TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS courses(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS grades(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        value REAL NOT NULL,
        student_id INTEGER NOT NULL,
        course_id INTEGER NOT NULL,
        FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
        FOREIGN KEY(course_id) REFERENCES courses(id) ON DELETE CASCADE,
        UNIQUE(student_id, course_id)
    );

    CREATE INDEX IF NOT EXISTS idx_grades_course ON grades(course_id);
";

/// A [`StudentStore`] kept in a SQLite database.
///
/// Students, courses and grades live in three tables. The uniqueness rules and the cascade
/// from a student (or course) to its grades are declared in the schema, so SQLite itself
/// enforces them. All clones share one connection.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// opens (or creates) the database file inside `working_dir`.
    /// If the `working_dir` does not exist it will be created.
    #[instrument]
    pub fn open(working_dir: &Path) -> Result<SqliteStore> {
        info!("opening sqlite store");
        fs::create_dir_all(working_dir)?;
        let conn = Connection::open(working_dir.join(DB_FILE))?;
        SqliteStore::init(conn)
    }

    /// creates a store that lives only in memory, its data is gone once the last clone is dropped
    pub fn open_in_memory() -> Result<SqliteStore> {
        SqliteStore::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<SqliteStore> {
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StudentDbError::StringErr("sqlite connection lock was poisoned".to_string()))
    }
}

impl StudentStore for SqliteStore {
    fn get_all_students(&self) -> Result<Vec<StudentDto>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, first_name, last_name, index_number FROM students ORDER BY id",
        )?;
        let students = stmt
            .query_map([], |row| {
                Ok(StudentDto {
                    id: Some(row.get(0)?),
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    index_number: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(students)
    }

    fn get_grades_for_student(&self, student_id: i64) -> Result<Vec<GradeDto>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT g.id, c.name, g.value
             FROM grades g
             JOIN courses c ON c.id = g.course_id
             WHERE g.student_id = ?1
             ORDER BY g.id",
        )?;
        let grades = stmt
            .query_map(params![student_id], |row| {
                Ok(GradeDto {
                    id: row.get(0)?,
                    course_name: row.get(1)?,
                    value: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(grades)
    }

    #[instrument(skip(self))]
    fn add_student(&self, student: StudentDto) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            "INSERT INTO students (first_name, last_name, index_number) VALUES (?1, ?2, ?3)",
            params![student.first_name, student.last_name, student.index_number],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                return Err(StudentDbError::DuplicateIndexNumber(student.index_number))
            }
            Err(e) => return Err(e.into()),
        }
        debug!(id = tx.last_insert_rowid(), "student added");
        tx.commit()?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove_student(&self, student_id: i64) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        // grades go with the student through ON DELETE CASCADE
        let removed = tx.execute("DELETE FROM students WHERE id = ?1", params![student_id])?;
        debug!(removed);
        tx.commit()?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn add_course(&self, name: String) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        find_or_create_course(&tx, &name)?;
        tx.commit()?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn add_grade(&self, student_id: i64, course_name: String, value: i32) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let student: Option<i64> = tx
            .query_row(
                "SELECT id FROM students WHERE id = ?1",
                params![student_id],
                |row| row.get(0),
            )
            .optional()?;
        if student.is_none() {
            return Err(StudentDbError::StudentNotFound(student_id));
        }

        let course_id = find_or_create_course(&tx, &course_name)?;
        let inserted = tx.execute(
            "INSERT INTO grades (value, student_id, course_id) VALUES (?1, ?2, ?3)",
            params![f64::from(value), student_id, course_id],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint_violation(&e) => {
                // dropping `tx` rolls back a course created above
                return Err(StudentDbError::DuplicateGrade { student_id, course_name });
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit()?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove_grade(&self, student_id: i64, course_name: String) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM grades
             WHERE student_id = ?1
               AND course_id IN (SELECT id FROM courses WHERE name = ?2)",
            params![student_id, course_name],
        )?;
        debug!(removed);
        tx.commit()?;
        Ok(())
    }
}

/// returns the id of the course called `name`, inserting the course first if it is missing
fn find_or_create_course(tx: &Transaction<'_>, name: &str) -> Result<i64> {
    let existing: Option<i64> = tx
        .query_row("SELECT id FROM courses WHERE name = ?1", params![name], |row| row.get(0))
        .optional()?;
    match existing {
        Some(id) => Ok(id),
        None => {
            tx.execute("INSERT INTO courses (name) VALUES (?1)", params![name])?;
            let id = tx.last_insert_rowid();
            debug!(id, name, "created course");
            Ok(id)
        }
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(store: &SqliteStore, table: &str) -> i64 {
        let conn = store.lock().unwrap();
        let n: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap();
        n
    }

    #[test]
    fn deleting_a_course_cascades_to_its_grades() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_student(StudentDto::new("Jan", "Kowalski", "s12345")).unwrap();
        store.add_student(StudentDto::new("Anna", "Nowak", "s22222")).unwrap();
        store.add_grade(1, "Maths".to_string(), 4).unwrap();
        store.add_grade(2, "Maths".to_string(), 5).unwrap();
        store.add_grade(2, "Physics".to_string(), 3).unwrap();
        assert_eq!(count(&store, "grades"), 3);

        store
            .lock()
            .unwrap()
            .execute("DELETE FROM courses WHERE name = 'Maths'", [])
            .unwrap();

        assert_eq!(count(&store, "grades"), 1);
        let left = store.get_grades_for_student(2).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].course_name, "Physics");
    }

    #[test]
    fn failed_grade_leaves_no_course_behind() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            store.add_grade(7, "Chemistry".to_string(), 3),
            Err(StudentDbError::StudentNotFound(7))
        ));
        assert_eq!(count(&store, "courses"), 0);
    }

    #[test]
    fn data_survives_reopening() {
        let dir = tempfile::TempDir::new().unwrap();
        {
            let store = SqliteStore::open(dir.path()).unwrap();
            store.add_student(StudentDto::new("Jan", "Kowalski", "s12345")).unwrap();
            store.add_grade(1, "Maths".to_string(), 4).unwrap();
        }
        let store = SqliteStore::open(dir.path()).unwrap();
        assert_eq!(store.get_all_students().unwrap().len(), 1);
        assert_eq!(store.get_grades_for_student(1).unwrap()[0].value, 4.0);
    }
}
