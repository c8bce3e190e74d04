use studentdb::{Result, SledStore, SqliteStore, StudentDbError, StudentDto, StudentStore};
use tempfile::TempDir;

// every test runs once per engine, the engines must behave the same way
macro_rules! engine_tests {
    ($($name:ident),* $(,)?) => {
        mod sqlite {
            use super::*;
            $(
                #[test]
                fn $name() -> Result<()> {
                    let dir = TempDir::new().expect("unable to create temporary working directory");
                    super::$name(SqliteStore::open(dir.path())?)
                }
            )*
        }

        mod sled {
            use super::*;
            $(
                #[test]
                fn $name() -> Result<()> {
                    let dir = TempDir::new().expect("unable to create temporary working directory");
                    super::$name(SledStore::open(dir.path())?)
                }
            )*
        }
    };
}

engine_tests!(
    empty_store_has_no_students,
    added_students_are_listed_in_order,
    duplicate_index_number_is_rejected,
    unknown_student_has_no_grades,
    grades_are_listed_with_course_names,
    grade_requires_existing_student,
    second_grade_for_same_course_is_rejected,
    same_course_can_be_graded_for_different_students,
    add_course_is_idempotent,
    removing_student_removes_their_grades,
    removing_unknown_student_is_a_no_op,
    remove_grade_only_touches_one_course,
    removing_missing_grade_is_a_no_op,
    removed_grade_can_be_given_again,
    index_number_is_free_after_removal,
);

fn add(store: &impl StudentStore, first: &str, last: &str, index: &str) -> Result<i64> {
    store.add_student(StudentDto::new(first, last, index))?;
    let student = store
        .get_all_students()?
        .into_iter()
        .find(|s| s.index_number == index)
        .expect("student was not stored");
    Ok(student.id.expect("stored student has no id"))
}

fn empty_store_has_no_students<S: StudentStore>(store: S) -> Result<()> {
    assert!(store.get_all_students()?.is_empty());
    Ok(())
}

fn added_students_are_listed_in_order<S: StudentStore>(store: S) -> Result<()> {
    let jan = add(&store, "Jan", "Kowalski", "s12345")?;
    let anna = add(&store, "Anna", "Nowak", "s22222")?;
    assert!(jan < anna);

    let students = store.get_all_students()?;
    assert_eq!(students.len(), 2);
    assert_eq!(students[0].id, Some(jan));
    assert_eq!(students[0].first_name, "Jan");
    assert_eq!(students[0].last_name, "Kowalski");
    assert_eq!(students[0].index_number, "s12345");
    assert_eq!(students[1].id, Some(anna));
    Ok(())
}

fn duplicate_index_number_is_rejected<S: StudentStore>(store: S) -> Result<()> {
    add(&store, "Jan", "Kowalski", "s12345")?;
    let err = store
        .add_student(StudentDto::new("Janusz", "Kowal", "s12345"))
        .unwrap_err();
    assert!(matches!(err, StudentDbError::DuplicateIndexNumber(ref index) if index == "s12345"));

    let students = store.get_all_students()?;
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].first_name, "Jan");
    Ok(())
}

fn unknown_student_has_no_grades<S: StudentStore>(store: S) -> Result<()> {
    assert!(store.get_grades_for_student(404)?.is_empty());
    Ok(())
}

fn grades_are_listed_with_course_names<S: StudentStore>(store: S) -> Result<()> {
    let jan = add(&store, "Jan", "Kowalski", "s12345")?;
    store.add_grade(jan, "Maths".to_string(), 5)?;
    store.add_grade(jan, "Physics".to_string(), 3)?;

    let grades = store.get_grades_for_student(jan)?;
    assert_eq!(grades.len(), 2);
    assert_eq!(grades[0].course_name, "Maths");
    assert_eq!(grades[0].value, 5.0);
    assert_eq!(grades[1].course_name, "Physics");
    assert_eq!(grades[1].value, 3.0);
    assert!(grades[0].id < grades[1].id);
    Ok(())
}

fn grade_requires_existing_student<S: StudentStore>(store: S) -> Result<()> {
    let err = store.add_grade(77, "Maths".to_string(), 4).unwrap_err();
    assert!(matches!(err, StudentDbError::StudentNotFound(77)));
    Ok(())
}

fn second_grade_for_same_course_is_rejected<S: StudentStore>(store: S) -> Result<()> {
    let jan = add(&store, "Jan", "Kowalski", "s12345")?;
    store.add_grade(jan, "Maths".to_string(), 4)?;

    let err = store.add_grade(jan, "Maths".to_string(), 3).unwrap_err();
    assert!(matches!(
        err,
        StudentDbError::DuplicateGrade { student_id, ref course_name }
            if student_id == jan && course_name == "Maths"
    ));

    // the first grade is untouched
    let grades = store.get_grades_for_student(jan)?;
    assert_eq!(grades.len(), 1);
    assert_eq!(grades[0].value, 4.0);
    Ok(())
}

fn same_course_can_be_graded_for_different_students<S: StudentStore>(store: S) -> Result<()> {
    let jan = add(&store, "Jan", "Kowalski", "s12345")?;
    let anna = add(&store, "Anna", "Nowak", "s22222")?;
    store.add_course("Maths".to_string())?;
    store.add_grade(jan, "Maths".to_string(), 4)?;
    store.add_grade(anna, "Maths".to_string(), 2)?;

    assert_eq!(store.get_grades_for_student(jan)?[0].value, 4.0);
    assert_eq!(store.get_grades_for_student(anna)?[0].value, 2.0);
    Ok(())
}

fn add_course_is_idempotent<S: StudentStore>(store: S) -> Result<()> {
    store.add_course("Maths".to_string())?;
    store.add_course("Maths".to_string())?;

    // a grade for the existing course reuses it, so a second grade for it is a duplicate
    let jan = add(&store, "Jan", "Kowalski", "s12345")?;
    store.add_grade(jan, "Maths".to_string(), 4)?;
    assert!(store.add_grade(jan, "Maths".to_string(), 5).is_err());
    Ok(())
}

fn removing_student_removes_their_grades<S: StudentStore>(store: S) -> Result<()> {
    let jan = add(&store, "Jan", "Kowalski", "s12345")?;
    let anna = add(&store, "Anna", "Nowak", "s22222")?;
    store.add_grade(jan, "Maths".to_string(), 4)?;
    store.add_grade(jan, "Physics".to_string(), 5)?;
    store.add_grade(anna, "Maths".to_string(), 3)?;

    store.remove_student(jan)?;

    let students = store.get_all_students()?;
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].id, Some(anna));
    assert!(store.get_grades_for_student(jan)?.is_empty());
    assert_eq!(store.get_grades_for_student(anna)?.len(), 1);
    Ok(())
}

fn removing_unknown_student_is_a_no_op<S: StudentStore>(store: S) -> Result<()> {
    add(&store, "Jan", "Kowalski", "s12345")?;
    store.remove_student(999)?;
    assert_eq!(store.get_all_students()?.len(), 1);
    Ok(())
}

fn remove_grade_only_touches_one_course<S: StudentStore>(store: S) -> Result<()> {
    let jan = add(&store, "Jan", "Kowalski", "s12345")?;
    let anna = add(&store, "Anna", "Nowak", "s22222")?;
    store.add_grade(jan, "Maths".to_string(), 4)?;
    store.add_grade(jan, "Physics".to_string(), 5)?;
    store.add_grade(anna, "Maths".to_string(), 3)?;

    store.remove_grade(jan, "Maths".to_string())?;

    let grades = store.get_grades_for_student(jan)?;
    assert_eq!(grades.len(), 1);
    assert_eq!(grades[0].course_name, "Physics");
    assert_eq!(store.get_grades_for_student(anna)?.len(), 1);
    Ok(())
}

fn removing_missing_grade_is_a_no_op<S: StudentStore>(store: S) -> Result<()> {
    let jan = add(&store, "Jan", "Kowalski", "s12345")?;
    store.add_grade(jan, "Maths".to_string(), 4)?;

    store.remove_grade(jan, "History".to_string())?;
    store.add_course("Biology".to_string())?;
    store.remove_grade(jan, "Biology".to_string())?;
    store.remove_grade(999, "Maths".to_string())?;

    assert_eq!(store.get_grades_for_student(jan)?.len(), 1);
    Ok(())
}

fn removed_grade_can_be_given_again<S: StudentStore>(store: S) -> Result<()> {
    let jan = add(&store, "Jan", "Kowalski", "s12345")?;
    store.add_grade(jan, "Maths".to_string(), 2)?;
    store.remove_grade(jan, "Maths".to_string())?;
    store.add_grade(jan, "Maths".to_string(), 5)?;

    let grades = store.get_grades_for_student(jan)?;
    assert_eq!(grades.len(), 1);
    assert_eq!(grades[0].value, 5.0);
    Ok(())
}

fn index_number_is_free_after_removal<S: StudentStore>(store: S) -> Result<()> {
    let jan = add(&store, "Jan", "Kowalski", "s12345")?;
    store.remove_student(jan)?;
    let janusz = add(&store, "Janusz", "Kowal", "s12345")?;
    assert_ne!(jan, janusz);
    assert!(store.get_grades_for_student(janusz)?.is_empty());
    Ok(())
}

// ids are checked across a reopen, so these open the store themselves
mod ids {
    use super::*;
    use std::path::Path;
    use std::thread;
    use std::time::Duration;

    // a dropped sled store may hold its directory lock for a moment
    fn open_retrying<S>(open: fn(&Path) -> Result<S>, path: &Path) -> Result<S> {
        for _ in 0..50 {
            if let Ok(store) = open(path) {
                return Ok(store);
            }
            thread::sleep(Duration::from_millis(20));
        }
        open(path)
    }

    fn ids_are_dense_per_entity<S: StudentStore>(open: fn(&Path) -> Result<S>) -> Result<()> {
        let dir = TempDir::new().expect("unable to create temporary working directory");
        let store = open(dir.path())?;
        let jan = add(&store, "Jan", "Kowalski", "s12345")?;
        store.add_grade(jan, "Maths".to_string(), 4)?;
        store.add_course("Physics".to_string())?;
        assert!(store.add_grade(99, "Chemistry".to_string(), 3).is_err());
        let anna = add(&store, "Anna", "Nowak", "s22222")?;
        assert_eq!((jan, anna), (1, 2));
        assert_eq!(store.get_grades_for_student(jan)?[0].id, 1);
        drop(store);

        let store = open_retrying(open, dir.path())?;
        let piotr = add(&store, "Piotr", "Wisniewski", "s33333")?;
        let ids: Vec<_> = store.get_all_students()?.iter().filter_map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(piotr, 3);

        store.add_grade(anna, "Physics".to_string(), 5)?;
        assert_eq!(store.get_grades_for_student(anna)?[0].id, 2);
        Ok(())
    }

    #[test]
    fn sqlite_ids_are_dense_per_entity() -> Result<()> {
        ids_are_dense_per_entity(SqliteStore::open)
    }

    #[test]
    fn sled_ids_are_dense_per_entity() -> Result<()> {
        ids_are_dense_per_entity(SledStore::open)
    }
}
