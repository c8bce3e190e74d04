use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionResult,
    TransactionalTree,
};
use sled::{Db, Transactional, Tree};
use tracing::{debug, info, instrument};

use super::StudentStore;
use crate::{GradeDto, Result, StudentDbError, StudentDto};

// directory, inside the working dir, that holds the sled database
const SLED_DIR: &str = "sled";

/// A [`StudentStore`] kept in a [`sled`] database.
///
/// sled has no notion of tables or foreign keys, so the relational rules are kept by the
/// transactions of this engine instead. Data is spread across these trees:
///
/// - `students`: student id -> student record
/// - `index_numbers`: index number -> student id
/// - `courses`: course id -> course name
/// - `course_names`: course name -> course id
/// - `grades`: (student id, course id) -> grade record
/// - `meta`: entity name -> last id handed out for that entity
///
/// Keying grades by the (student, course) pair is what makes a second grade for the same pair
/// impossible. Each student record also lists the courses the student has a grade for, so that
/// removing a student can delete those grades within the same transaction.
///
/// Like an `AUTOINCREMENT` column, every entity has its own id sequence starting at 1. The
/// counter is bumped inside the transaction that inserts the record, so an aborted insert
/// hands out no id.
///
/// [`sled`]: https://docs.rs/sled/latest/sled/
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    students: Tree,
    index_numbers: Tree,
    courses: Tree,
    course_names: Tree,
    grades: Tree,
    meta: Tree,
}

// keys of the id counters in the `meta` tree
const STUDENT_SEQ: &str = "students";
const COURSE_SEQ: &str = "courses";
const GRADE_SEQ: &str = "grades";

#[derive(Debug, Serialize, Deserialize)]
struct StudentRecord {
    first_name: String,
    last_name: String,
    index_number: String,
    course_ids: Vec<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GradeRecord {
    id: i64,
    value: f64,
}

impl SledStore {
    /// opens (or creates) a sled database in a sub-directory of `working_dir`
    #[instrument]
    pub fn open(working_dir: &Path) -> Result<SledStore> {
        info!("opening sled store");
        SledStore::new(sled::open(working_dir.join(SLED_DIR))?)
    }

    /// builds a store on top of an already opened sled [`Db`]
    pub fn new(db: Db) -> Result<SledStore> {
        Ok(SledStore {
            students: db.open_tree("students")?,
            index_numbers: db.open_tree("index_numbers")?,
            courses: db.open_tree("courses")?,
            course_names: db.open_tree("course_names")?,
            grades: db.open_tree("grades")?,
            meta: db.open_tree("meta")?,
            db,
        })
    }

    fn course_name(&self, course_id: i64) -> Result<String> {
        match self.courses.get(id_key(course_id))? {
            Some(name) => String::from_utf8(name.to_vec())
                .map_err(|e| StudentDbError::StringErr(format!("invalid course name: {}", e))),
            None => Err(StudentDbError::StringErr(format!(
                "grade refers to missing course {}",
                course_id
            ))),
        }
    }
}

impl StudentStore for SledStore {
    fn get_all_students(&self) -> Result<Vec<StudentDto>> {
        self.students
            .iter()
            .map(|entry| {
                let (key, value) = entry?;
                let record: StudentRecord = decode(&value)?;
                Ok(StudentDto {
                    id: Some(decode_id(&key)?),
                    first_name: record.first_name,
                    last_name: record.last_name,
                    index_number: record.index_number,
                })
            })
            .collect()
    }

    fn get_grades_for_student(&self, student_id: i64) -> Result<Vec<GradeDto>> {
        let mut grades = self
            .grades
            .scan_prefix(id_key(student_id))
            .map(|entry| {
                let (key, value) = entry?;
                let record: GradeRecord = decode(&value)?;
                Ok(GradeDto {
                    id: record.id,
                    course_name: self.course_name(decode_id(&key[8..])?)?,
                    value: record.value,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        grades.sort_by_key(|grade| grade.id);
        Ok(grades)
    }

    #[instrument(skip(self))]
    fn add_student(&self, student: StudentDto) -> Result<()> {
        let index_number = student.index_number.clone();
        let record = encode(&StudentRecord {
            first_name: student.first_name,
            last_name: student.last_name,
            index_number: student.index_number,
            course_ids: vec![],
        })?;

        let result: TransactionResult<i64, StudentDbError> =
            (&self.students, &self.index_numbers, &self.meta).transaction(
                |(students, index_numbers, meta)| {
                    if index_numbers.get(index_number.as_bytes())?.is_some() {
                        return Err(abort(StudentDbError::DuplicateIndexNumber(
                            index_number.clone(),
                        )));
                    }
                    let id = next_id(meta, STUDENT_SEQ)?;
                    let key = id_key(id);
                    index_numbers.insert(index_number.as_bytes(), &key[..])?;
                    students.insert(&key[..], record.as_slice())?;
                    Ok(id)
                },
            );
        let id = result?;
        self.db.flush()?;
        debug!(id, "student added");
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove_student(&self, student_id: i64) -> Result<()> {
        let key = id_key(student_id);
        let result: TransactionResult<bool, StudentDbError> =
            (&self.students, &self.index_numbers, &self.grades).transaction(
                |(students, index_numbers, grades)| {
                    let bytes = match students.get(&key[..])? {
                        Some(bytes) => bytes,
                        None => return Ok(false),
                    };
                    let record: StudentRecord = decode(&bytes).map_err(abort)?;
                    for course_id in &record.course_ids {
                        grades.remove(grade_key(student_id, *course_id))?;
                    }
                    index_numbers.remove(record.index_number.as_bytes())?;
                    students.remove(&key[..])?;
                    Ok(true)
                },
            );
        let removed = result?;
        self.db.flush()?;
        debug!(removed);
        Ok(())
    }

    #[instrument(skip(self))]
    fn add_course(&self, name: String) -> Result<()> {
        let result: TransactionResult<i64, StudentDbError> =
            (&self.courses, &self.course_names, &self.meta).transaction(
                |(courses, course_names, meta)| {
                    find_or_create_course(courses, course_names, meta, &name)
                },
            );
        let id = result?;
        self.db.flush()?;
        debug!(id);
        Ok(())
    }

    #[instrument(skip(self))]
    fn add_grade(&self, student_id: i64, course_name: String, value: i32) -> Result<()> {
        let key = id_key(student_id);

        let result: TransactionResult<(), StudentDbError> =
            (&self.students, &self.courses, &self.course_names, &self.grades, &self.meta)
                .transaction(|(students, courses, course_names, grades, meta)| {
                    let bytes = students
                        .get(&key[..])?
                        .ok_or_else(|| abort(StudentDbError::StudentNotFound(student_id)))?;
                    let mut record: StudentRecord = decode(&bytes).map_err(abort)?;

                    let course_id =
                        find_or_create_course(courses, course_names, meta, &course_name)?;
                    let pair = grade_key(student_id, course_id);
                    if grades.get(pair.as_slice())?.is_some() {
                        // aborting also discards a course created above
                        return Err(abort(StudentDbError::DuplicateGrade {
                            student_id,
                            course_name: course_name.clone(),
                        }));
                    }
                    let grade = GradeRecord {
                        id: next_id(meta, GRADE_SEQ)?,
                        value: f64::from(value),
                    };
                    grades.insert(pair, encode(&grade).map_err(abort)?)?;

                    record.course_ids.push(course_id);
                    students.insert(&key[..], encode(&record).map_err(abort)?)?;
                    Ok(())
                });
        result?;
        self.db.flush()?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove_grade(&self, student_id: i64, course_name: String) -> Result<()> {
        let key = id_key(student_id);
        let result: TransactionResult<(), StudentDbError> =
            (&self.students, &self.course_names, &self.grades).transaction(
                |(students, course_names, grades)| {
                    let course_id = match course_names.get(course_name.as_bytes())? {
                        Some(bytes) => decode_id(&bytes).map_err(abort)?,
                        None => return Ok(()),
                    };
                    if grades.remove(grade_key(student_id, course_id))?.is_none() {
                        return Ok(());
                    }
                    if let Some(bytes) = students.get(&key[..])? {
                        let mut record: StudentRecord = decode(&bytes).map_err(abort)?;
                        record.course_ids.retain(|id| *id != course_id);
                        students.insert(&key[..], encode(&record).map_err(abort)?)?;
                    }
                    Ok(())
                },
            );
        result?;
        self.db.flush()?;
        Ok(())
    }
}

/// returns the id of the course called `name`, inserting it under a new id when it is missing
fn find_or_create_course(
    courses: &TransactionalTree,
    course_names: &TransactionalTree,
    meta: &TransactionalTree,
    name: &str,
) -> ConflictableTransactionResult<i64, StudentDbError> {
    if let Some(bytes) = course_names.get(name.as_bytes())? {
        return decode_id(&bytes).map_err(abort);
    }
    let new_id = next_id(meta, COURSE_SEQ)?;
    let key = id_key(new_id);
    courses.insert(&key[..], name.as_bytes())?;
    course_names.insert(name.as_bytes(), &key[..])?;
    debug!(id = new_id, name, "created course");
    Ok(new_id)
}

/// bumps the counter stored under `seq` and returns the new id, the first id is 1
fn next_id(meta: &TransactionalTree, seq: &str) -> ConflictableTransactionResult<i64, StudentDbError> {
    let last = match meta.get(seq.as_bytes())? {
        Some(bytes) => decode_id(&bytes).map_err(abort)?,
        None => 0,
    };
    let id = last + 1;
    meta.insert(seq.as_bytes(), &id_key(id)[..])?;
    Ok(id)
}

// ids are positive, so big-endian keys iterate in id order
fn id_key(id: i64) -> [u8; 8] {
    id.to_be_bytes()
}

fn grade_key(student_id: i64, course_id: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&id_key(student_id));
    key.extend_from_slice(&id_key(course_id));
    key
}

fn decode_id(bytes: &[u8]) -> Result<i64> {
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StudentDbError::StringErr(format!("invalid id of {} bytes", bytes.len())))?;
    Ok(i64::from_be_bytes(bytes))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn abort(e: StudentDbError) -> ConflictableTransactionError<StudentDbError> {
    ConflictableTransactionError::Abort(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn student_record(store: &SledStore, student_id: i64) -> Option<StudentRecord> {
        store
            .students
            .get(id_key(student_id))
            .unwrap()
            .map(|bytes| decode(&bytes).unwrap())
    }

    #[test]
    fn student_record_tracks_graded_courses() {
        let dir = TempDir::new().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        store.add_student(StudentDto::new("Jan", "Kowalski", "s12345")).unwrap();
        let id = store.get_all_students().unwrap()[0].id.unwrap();

        store.add_grade(id, "Maths".to_string(), 4).unwrap();
        store.add_grade(id, "Physics".to_string(), 3).unwrap();
        assert_eq!(student_record(&store, id).unwrap().course_ids.len(), 2);

        store.remove_grade(id, "Maths".to_string()).unwrap();
        let record = student_record(&store, id).unwrap();
        assert_eq!(record.course_ids.len(), 1);
        assert_eq!(store.course_name(record.course_ids[0]).unwrap(), "Physics");
    }

    #[test]
    fn removing_a_student_clears_index_number_and_grades() {
        let dir = TempDir::new().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        store.add_student(StudentDto::new("Jan", "Kowalski", "s12345")).unwrap();
        let id = store.get_all_students().unwrap()[0].id.unwrap();
        store.add_grade(id, "Maths".to_string(), 5).unwrap();

        store.remove_student(id).unwrap();

        assert!(student_record(&store, id).is_none());
        assert!(store.index_numbers.is_empty());
        assert!(store.grades.is_empty());
        // the course outlives the student
        assert_eq!(store.course_names.len(), 1);
    }

    // sled's background flusher can hold the directory lock for a moment after the last
    // handle is dropped
    fn reopen(path: &Path) -> SledStore {
        for _ in 0..50 {
            if let Ok(store) = SledStore::open(path) {
                return store;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        SledStore::open(path).unwrap()
    }

    #[test]
    fn data_survives_reopening() {
        let dir = TempDir::new().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        store.add_student(StudentDto::new("Jan", "Kowalski", "s12345")).unwrap();
        let id = store.get_all_students().unwrap()[0].id.unwrap();
        store.add_grade(id, "Maths".to_string(), 4).unwrap();
        store.db.flush().unwrap();
        drop(store);

        let store = reopen(dir.path());
        let students = store.get_all_students().unwrap();
        assert_eq!(students[0].index_number, "s12345");
        assert_eq!(store.get_grades_for_student(id).unwrap()[0].course_name, "Maths");

        // the id counters are persisted with the data
        store.add_student(StudentDto::new("Anna", "Nowak", "s23456")).unwrap();
        assert_eq!(store.get_all_students().unwrap()[1].id, Some(id + 1));
    }

    #[test]
    fn failed_grade_leaves_no_course_behind() {
        let dir = TempDir::new().unwrap();
        let store = SledStore::open(dir.path()).unwrap();

        match store.add_grade(7, "Maths".to_string(), 4) {
            Err(StudentDbError::StudentNotFound(7)) => {}
            other => panic!("expected StudentNotFound, got {:?}", other),
        }
        assert!(store.course_names.is_empty());
        assert!(store.courses.is_empty());

        // the aborted insert did not use up a course id
        store.add_course("Physics".to_string()).unwrap();
        assert_eq!(decode_id(&store.course_names.get("Physics").unwrap().unwrap()).unwrap(), 1);
    }

    #[test]
    fn every_entity_counts_its_own_ids() {
        let dir = TempDir::new().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        store.add_student(StudentDto::new("Jan", "Kowalski", "s12345")).unwrap();
        store.add_grade(1, "Maths".to_string(), 4).unwrap();
        store.add_course("Physics".to_string()).unwrap();
        store.add_course("Maths".to_string()).unwrap();
        assert!(store.add_student(StudentDto::new("Jan", "Kowalski", "s12345")).is_err());
        store.add_student(StudentDto::new("Anna", "Nowak", "s23456")).unwrap();

        let ids: Vec<_> = store.get_all_students().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![Some(1), Some(2)]);
        assert_eq!(decode_id(&store.course_names.get("Physics").unwrap().unwrap()).unwrap(), 2);
        assert_eq!(store.get_grades_for_student(1).unwrap()[0].id, 1);
    }
}
