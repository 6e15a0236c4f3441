//! PostgreSQL store.
//!
//! Mutations run in a transaction. The owning exam row is locked with
//! `SELECT ... FOR UPDATE` before any child row, so concurrent transitions on
//! one exam serialize and lock order stays parent-first.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::migrate::Migrator;
use sqlx::{FromRow, PgConnection, PgPool};

use athena_common::{
    AppError, AppResult, CorrelationKey, ExamId, ExecutionResult, ExerciseId, SolutionId,
    SubmissionId, TestCaseId,
};

use super::{Guard, Mutation, Store, not_found};
use crate::models::{Exam, ExecutionRecord, Exercise, ExerciseSolution, Submission, TestCase};

/// Schema migrations for the exam tables
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Map a sqlx error onto the application taxonomy.
pub fn db_error(e: sqlx::Error) -> AppError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return AppError::Conflict(db.message().to_string());
        }
        if db.is_foreign_key_violation() {
            return AppError::NotFound(db.message().to_string());
        }
    }
    AppError::Database(e.to_string())
}

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, FromRow)]
struct ExamRow {
    id: i64,
    description: String,
    starting_at: DateTime<Utc>,
    duration_ms: i64,
    state: String,
    actual_starting_moment: Option<DateTime<Utc>>,
    actual_duration_ms: Option<i64>,
}

impl ExamRow {
    fn into_exam(self, owners: Vec<String>) -> AppResult<Exam> {
        Ok(Exam {
            id: self.id,
            description: self.description,
            starting_at: self.starting_at,
            duration: Duration::milliseconds(self.duration_ms),
            state: self.state.parse()?,
            actual_starting_moment: self.actual_starting_moment,
            actual_duration: self.actual_duration_ms.map(Duration::milliseconds),
            owners: owners.into_iter().collect(),
        })
    }
}

#[derive(Debug, FromRow)]
struct ExerciseRow {
    id: i64,
    exam_id: i64,
    question: String,
    language: String,
    solution_template: Option<String>,
}

impl TryFrom<ExerciseRow> for Exercise {
    type Error = AppError;

    fn try_from(row: ExerciseRow) -> AppResult<Self> {
        Ok(Exercise {
            id: row.id,
            exam_id: row.exam_id,
            question: row.question,
            language: row.language.parse()?,
            solution_template: row.solution_template,
        })
    }
}

#[derive(Debug, FromRow)]
struct TestCaseRow {
    id: i64,
    exercise_id: i64,
    visibility: String,
    timeout_ms: Option<i64>,
    program_arguments: Vec<String>,
    stdin: Vec<String>,
    expected_output: Vec<String>,
}

impl TryFrom<TestCaseRow> for TestCase {
    type Error = AppError;

    fn try_from(row: TestCaseRow) -> AppResult<Self> {
        Ok(TestCase {
            id: row.id,
            exercise_id: row.exercise_id,
            visibility: row.visibility.parse()?,
            timeout_ms: timeout_from_db(row.timeout_ms)?,
            program_arguments: row.program_arguments,
            stdin: row.stdin,
            expected_output: row.expected_output,
        })
    }
}

fn timeout_to_db(timeout_ms: Option<u64>) -> AppResult<Option<i64>> {
    timeout_ms
        .map(|ms| {
            i64::try_from(ms).map_err(|_| {
                AppError::Validation(format!("Test case timeout {ms} ms is out of range"))
            })
        })
        .transpose()
}

fn timeout_from_db(timeout_ms: Option<i64>) -> AppResult<Option<u64>> {
    timeout_ms
        .map(|ms| {
            u64::try_from(ms)
                .map_err(|_| AppError::Database(format!("Stored test case timeout {ms} is negative")))
        })
        .transpose()
}

#[derive(Debug, FromRow)]
struct SubmissionRow {
    id: i64,
    exam_id: i64,
    submitter: String,
    state: String,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = AppError;

    fn try_from(row: SubmissionRow) -> AppResult<Self> {
        Ok(Submission {
            id: row.id,
            exam_id: row.exam_id,
            submitter: row.submitter,
            state: row.state.parse()?,
        })
    }
}

#[derive(Debug, FromRow)]
struct SolutionRow {
    id: i64,
    exercise_id: i64,
    submission_id: i64,
    answer: String,
    compiler_flags: Option<String>,
    main_file_name: Option<String>,
}

impl From<SolutionRow> for ExerciseSolution {
    fn from(row: SolutionRow) -> Self {
        ExerciseSolution {
            id: row.id,
            exercise_id: row.exercise_id,
            submission_id: row.submission_id,
            answer: row.answer,
            compiler_flags: row.compiler_flags,
            main_file_name: row.main_file_name,
        }
    }
}

#[derive(Debug, FromRow)]
struct ResultRow {
    solution_id: i64,
    test_case_id: i64,
    result: serde_json::Value,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<ResultRow> for ExecutionRecord {
    type Error = AppError;

    fn try_from(row: ResultRow) -> AppResult<Self> {
        Ok(ExecutionRecord {
            solution_id: row.solution_id,
            test_case_id: row.test_case_id,
            result: ExecutionResult::from_value(row.result)?,
            recorded_at: row.recorded_at,
        })
    }
}

// =============================================================================
// Queries
// =============================================================================

fn lock_clause(lock: bool) -> &'static str {
    if lock { " FOR UPDATE" } else { "" }
}

async fn fetch_exam(conn: &mut PgConnection, id: ExamId, lock: bool) -> AppResult<Option<Exam>> {
    let sql = format!("SELECT * FROM exams WHERE id = $1{}", lock_clause(lock));
    let Some(row) = sqlx::query_as::<_, ExamRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?
    else {
        return Ok(None);
    };

    let owners = sqlx::query_scalar::<_, String>(
        "SELECT owner FROM exam_owners WHERE exam_id = $1 ORDER BY owner",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?;

    row.into_exam(owners).map(Some)
}

async fn lock_exam(conn: &mut PgConnection, id: ExamId) -> AppResult<Exam> {
    fetch_exam(conn, id, true)
        .await?
        .ok_or_else(|| not_found("Exam", id))
}

async fn save_owners(conn: &mut PgConnection, exam: &Exam) -> AppResult<()> {
    sqlx::query("DELETE FROM exam_owners WHERE exam_id = $1")
        .bind(exam.id)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

    let owners: Vec<String> = exam.owners.iter().cloned().collect();
    sqlx::query("INSERT INTO exam_owners (exam_id, owner) SELECT $1, UNNEST($2::text[])")
        .bind(exam.id)
        .bind(&owners)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;

    Ok(())
}

async fn fetch_exercise(
    conn: &mut PgConnection,
    id: ExerciseId,
    lock: bool,
) -> AppResult<Option<Exercise>> {
    let sql = format!("SELECT * FROM exercises WHERE id = $1{}", lock_clause(lock));
    sqlx::query_as::<_, ExerciseRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?
        .map(Exercise::try_from)
        .transpose()
}

async fn fetch_test_case(
    conn: &mut PgConnection,
    id: TestCaseId,
    lock: bool,
) -> AppResult<Option<TestCase>> {
    let sql = format!("SELECT * FROM test_cases WHERE id = $1{}", lock_clause(lock));
    sqlx::query_as::<_, TestCaseRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?
        .map(TestCase::try_from)
        .transpose()
}

async fn fetch_submission(
    conn: &mut PgConnection,
    id: SubmissionId,
    lock: bool,
) -> AppResult<Option<Submission>> {
    let sql = format!("SELECT * FROM submissions WHERE id = $1{}", lock_clause(lock));
    sqlx::query_as::<_, SubmissionRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?
        .map(Submission::try_from)
        .transpose()
}

async fn fetch_solution(
    conn: &mut PgConnection,
    id: SolutionId,
    lock: bool,
) -> AppResult<Option<ExerciseSolution>> {
    let sql = format!(
        "SELECT * FROM exercise_solutions WHERE id = $1{}",
        lock_clause(lock)
    );
    Ok(sqlx::query_as::<_, SolutionRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?
        .map(ExerciseSolution::from))
}

/// Exam owning a test case, through its exercise.
async fn exam_id_of_test_case(conn: &mut PgConnection, id: TestCaseId) -> AppResult<ExamId> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT e.exam_id
        FROM test_cases t
        JOIN exercises e ON e.id = t.exercise_id
        WHERE t.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_error)?
    .ok_or_else(|| not_found("Test case", id))
}

/// Store backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await
    }

    async fn acquire(&self) -> AppResult<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        self.pool.acquire().await.map_err(db_error)
    }

    async fn begin(&self) -> AppResult<sqlx::Transaction<'static, sqlx::Postgres>> {
        self.pool.begin().await.map_err(db_error)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_exam(&self, exam: Exam) -> AppResult<Exam> {
        let mut tx = self.begin().await?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO exams (description, starting_at, duration_ms, state,
                               actual_starting_moment, actual_duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&exam.description)
        .bind(exam.starting_at)
        .bind(exam.duration.num_milliseconds())
        .bind(exam.state.as_str())
        .bind(exam.actual_starting_moment)
        .bind(exam.actual_duration.map(|d| d.num_milliseconds()))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        let exam = Exam { id, ..exam };
        save_owners(&mut tx, &exam).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(exam)
    }

    async fn find_exam(&self, id: ExamId) -> AppResult<Option<Exam>> {
        let mut conn = self.acquire().await?;
        fetch_exam(&mut conn, id, false).await
    }

    async fn list_exams(&self) -> AppResult<Vec<Exam>> {
        let mut conn = self.acquire().await?;

        let rows = sqlx::query_as::<_, ExamRow>("SELECT * FROM exams ORDER BY id")
            .fetch_all(&mut *conn)
            .await
            .map_err(db_error)?;

        let owner_rows = sqlx::query_as::<_, (i64, String)>(
            "SELECT exam_id, owner FROM exam_owners ORDER BY exam_id, owner",
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)?;

        let mut owners: HashMap<ExamId, Vec<String>> = HashMap::new();
        for (exam_id, owner) in owner_rows {
            owners.entry(exam_id).or_default().push(owner);
        }

        rows.into_iter()
            .map(|row| {
                let exam_owners = owners.remove(&row.id).unwrap_or_default();
                row.into_exam(exam_owners)
            })
            .collect()
    }

    async fn update_exam(&self, id: ExamId, mutation: Mutation<Exam>) -> AppResult<Exam> {
        let mut tx = self.begin().await?;
        let mut exam = lock_exam(&mut tx, id).await?;
        mutation(&mut exam)?;
        exam.id = id;

        sqlx::query(
            r#"
            UPDATE exams
            SET description = $2,
                starting_at = $3,
                duration_ms = $4,
                state = $5,
                actual_starting_moment = $6,
                actual_duration_ms = $7
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&exam.description)
        .bind(exam.starting_at)
        .bind(exam.duration.num_milliseconds())
        .bind(exam.state.as_str())
        .bind(exam.actual_starting_moment)
        .bind(exam.actual_duration.map(|d| d.num_milliseconds()))
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        save_owners(&mut tx, &exam).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(exam)
    }

    async fn delete_exam(&self, id: ExamId, guard: Guard<Exam>) -> AppResult<()> {
        let mut tx = self.begin().await?;
        guard(&lock_exam(&mut tx, id).await?)?;

        sqlx::query("DELETE FROM exams WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)
    }

    async fn insert_exercise(&self, exercise: Exercise, guard: Guard<Exam>) -> AppResult<Exercise> {
        let mut tx = self.begin().await?;
        guard(&lock_exam(&mut tx, exercise.exam_id).await?)?;

        let row = sqlx::query_as::<_, ExerciseRow>(
            r#"
            INSERT INTO exercises (exam_id, question, language, solution_template)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(exercise.exam_id)
        .bind(&exercise.question)
        .bind(exercise.language.as_str())
        .bind(&exercise.solution_template)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Exercise::try_from(row)
    }

    async fn find_exercise(&self, id: ExerciseId) -> AppResult<Option<Exercise>> {
        let mut conn = self.acquire().await?;
        fetch_exercise(&mut conn, id, false).await
    }

    async fn list_exercises(&self, exam_id: ExamId) -> AppResult<Vec<Exercise>> {
        sqlx::query_as::<_, ExerciseRow>("SELECT * FROM exercises WHERE exam_id = $1 ORDER BY id")
            .bind(exam_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(Exercise::try_from)
            .collect()
    }

    async fn update_exercise(
        &self,
        id: ExerciseId,
        guard: Guard<Exam>,
        mutation: Mutation<Exercise>,
    ) -> AppResult<Exercise> {
        let mut tx = self.begin().await?;
        let exam_id = fetch_exercise(&mut tx, id, false)
            .await?
            .ok_or_else(|| not_found("Exercise", id))?
            .exam_id;
        guard(&lock_exam(&mut tx, exam_id).await?)?;

        let current = fetch_exercise(&mut tx, id, true)
            .await?
            .ok_or_else(|| not_found("Exercise", id))?;
        let mut exercise = current.clone();
        mutation(&mut exercise)?;

        sqlx::query(
            r#"
            UPDATE exercises
            SET question = $2, language = $3, solution_template = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&exercise.question)
        .bind(exercise.language.as_str())
        .bind(&exercise.solution_template)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(Exercise {
            id,
            exam_id: current.exam_id,
            ..exercise
        })
    }

    async fn delete_exercise(&self, id: ExerciseId, guard: Guard<Exam>) -> AppResult<()> {
        let mut tx = self.begin().await?;
        let exam_id = fetch_exercise(&mut tx, id, false)
            .await?
            .ok_or_else(|| not_found("Exercise", id))?
            .exam_id;
        guard(&lock_exam(&mut tx, exam_id).await?)?;

        sqlx::query("DELETE FROM exercises WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)
    }

    async fn insert_test_case(&self, test_case: TestCase, guard: Guard<Exam>) -> AppResult<TestCase> {
        let mut tx = self.begin().await?;
        let exam_id = fetch_exercise(&mut tx, test_case.exercise_id, false)
            .await?
            .ok_or_else(|| not_found("Exercise", test_case.exercise_id))?
            .exam_id;
        guard(&lock_exam(&mut tx, exam_id).await?)?;

        let row = sqlx::query_as::<_, TestCaseRow>(
            r#"
            INSERT INTO test_cases (exercise_id, visibility, timeout_ms, program_arguments,
                                    stdin, expected_output)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(test_case.exercise_id)
        .bind(test_case.visibility.as_str())
        .bind(timeout_to_db(test_case.timeout_ms)?)
        .bind(&test_case.program_arguments)
        .bind(&test_case.stdin)
        .bind(&test_case.expected_output)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        TestCase::try_from(row)
    }

    async fn find_test_case(&self, id: TestCaseId) -> AppResult<Option<TestCase>> {
        let mut conn = self.acquire().await?;
        fetch_test_case(&mut conn, id, false).await
    }

    async fn list_test_cases(&self, exercise_id: ExerciseId) -> AppResult<Vec<TestCase>> {
        sqlx::query_as::<_, TestCaseRow>(
            "SELECT * FROM test_cases WHERE exercise_id = $1 ORDER BY id",
        )
        .bind(exercise_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(TestCase::try_from)
        .collect()
    }

    async fn update_test_case(
        &self,
        id: TestCaseId,
        guard: Guard<Exam>,
        mutation: Mutation<TestCase>,
    ) -> AppResult<TestCase> {
        let mut tx = self.begin().await?;
        let exam_id = exam_id_of_test_case(&mut tx, id).await?;
        guard(&lock_exam(&mut tx, exam_id).await?)?;

        let current = fetch_test_case(&mut tx, id, true)
            .await?
            .ok_or_else(|| not_found("Test case", id))?;
        let mut test_case = current.clone();
        mutation(&mut test_case)?;

        sqlx::query(
            r#"
            UPDATE test_cases
            SET visibility = $2,
                timeout_ms = $3,
                program_arguments = $4,
                stdin = $5,
                expected_output = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(test_case.visibility.as_str())
        .bind(timeout_to_db(test_case.timeout_ms)?)
        .bind(&test_case.program_arguments)
        .bind(&test_case.stdin)
        .bind(&test_case.expected_output)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(TestCase {
            id,
            exercise_id: current.exercise_id,
            ..test_case
        })
    }

    async fn delete_test_case(&self, id: TestCaseId, guard: Guard<Exam>) -> AppResult<()> {
        let mut tx = self.begin().await?;
        let exam_id = exam_id_of_test_case(&mut tx, id).await?;
        guard(&lock_exam(&mut tx, exam_id).await?)?;

        sqlx::query("DELETE FROM test_cases WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)
    }

    async fn insert_submission(
        &self,
        submission: Submission,
        guard: Guard<Exam>,
    ) -> AppResult<Submission> {
        let mut tx = self.begin().await?;
        guard(&lock_exam(&mut tx, submission.exam_id).await?)?;

        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            INSERT INTO submissions (exam_id, submitter, state)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(submission.exam_id)
        .bind(&submission.submitter)
        .bind(submission.state.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match db_error(e) {
            AppError::Conflict(_) => AppError::Conflict(format!(
                "{} already has a submission for exam {}",
                submission.submitter, submission.exam_id
            )),
            other => other,
        })?;

        tx.commit().await.map_err(db_error)?;
        Submission::try_from(row)
    }

    async fn find_submission(&self, id: SubmissionId) -> AppResult<Option<Submission>> {
        let mut conn = self.acquire().await?;
        fetch_submission(&mut conn, id, false).await
    }

    async fn list_submissions(&self, exam_id: ExamId) -> AppResult<Vec<Submission>> {
        sqlx::query_as::<_, SubmissionRow>(
            "SELECT * FROM submissions WHERE exam_id = $1 ORDER BY id",
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(Submission::try_from)
        .collect()
    }

    async fn update_submission(
        &self,
        id: SubmissionId,
        guard: Guard<Exam>,
        mutation: Mutation<Submission>,
    ) -> AppResult<Submission> {
        let mut tx = self.begin().await?;
        let exam_id = fetch_submission(&mut tx, id, false)
            .await?
            .ok_or_else(|| not_found("Submission", id))?
            .exam_id;
        guard(&lock_exam(&mut tx, exam_id).await?)?;

        let current = fetch_submission(&mut tx, id, true)
            .await?
            .ok_or_else(|| not_found("Submission", id))?;
        let mut submission = current.clone();
        mutation(&mut submission)?;

        sqlx::query("UPDATE submissions SET state = $2 WHERE id = $1")
            .bind(id)
            .bind(submission.state.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(Submission {
            id,
            exam_id: current.exam_id,
            submitter: current.submitter,
            ..submission
        })
    }

    async fn insert_solution(
        &self,
        solution: ExerciseSolution,
        guard: Guard<Submission>,
    ) -> AppResult<ExerciseSolution> {
        let mut tx = self.begin().await?;
        let submission = fetch_submission(&mut tx, solution.submission_id, true)
            .await?
            .ok_or_else(|| not_found("Submission", solution.submission_id))?;
        let exercise = fetch_exercise(&mut tx, solution.exercise_id, false)
            .await?
            .ok_or_else(|| not_found("Exercise", solution.exercise_id))?;
        if exercise.exam_id != submission.exam_id {
            return Err(AppError::Validation(format!(
                "Exercise {} and submission {} belong to different exams",
                exercise.id, submission.id
            )));
        }
        guard(&submission)?;

        let row = sqlx::query_as::<_, SolutionRow>(
            r#"
            INSERT INTO exercise_solutions (exercise_id, submission_id, answer,
                                            compiler_flags, main_file_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(solution.exercise_id)
        .bind(solution.submission_id)
        .bind(&solution.answer)
        .bind(&solution.compiler_flags)
        .bind(&solution.main_file_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(row.into())
    }

    async fn find_solution(&self, id: SolutionId) -> AppResult<Option<ExerciseSolution>> {
        let mut conn = self.acquire().await?;
        fetch_solution(&mut conn, id, false).await
    }

    async fn list_solutions(&self, submission_id: SubmissionId) -> AppResult<Vec<ExerciseSolution>> {
        Ok(sqlx::query_as::<_, SolutionRow>(
            "SELECT * FROM exercise_solutions WHERE submission_id = $1 ORDER BY id",
        )
        .bind(submission_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(ExerciseSolution::from)
        .collect())
    }

    async fn update_solution(
        &self,
        id: SolutionId,
        guard: Guard<Submission>,
        mutation: Mutation<ExerciseSolution>,
    ) -> AppResult<ExerciseSolution> {
        let mut tx = self.begin().await?;
        let submission_id = fetch_solution(&mut tx, id, false)
            .await?
            .ok_or_else(|| not_found("Solution", id))?
            .submission_id;
        let submission = fetch_submission(&mut tx, submission_id, true)
            .await?
            .ok_or_else(|| not_found("Submission", submission_id))?;
        guard(&submission)?;

        let current = fetch_solution(&mut tx, id, true)
            .await?
            .ok_or_else(|| not_found("Solution", id))?;
        let mut solution = current.clone();
        mutation(&mut solution)?;

        sqlx::query(
            r#"
            UPDATE exercise_solutions
            SET answer = $2, compiler_flags = $3, main_file_name = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&solution.answer)
        .bind(&solution.compiler_flags)
        .bind(&solution.main_file_name)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(ExerciseSolution {
            id,
            exercise_id: current.exercise_id,
            submission_id: current.submission_id,
            ..solution
        })
    }

    async fn upsert_result(&self, record: ExecutionRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO execution_results (solution_id, test_case_id, result, recorded_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (solution_id, test_case_id)
            DO UPDATE SET
                result = EXCLUDED.result,
                recorded_at = EXCLUDED.recorded_at
            WHERE execution_results.result IS DISTINCT FROM EXCLUDED.result
            "#,
        )
        .bind(record.solution_id)
        .bind(record.test_case_id)
        .bind(record.result.to_value()?)
        .bind(record.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_result(&self, key: CorrelationKey) -> AppResult<Option<ExecutionRecord>> {
        sqlx::query_as::<_, ResultRow>(
            "SELECT * FROM execution_results WHERE solution_id = $1 AND test_case_id = $2",
        )
        .bind(key.solution_id)
        .bind(key.test_case_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .map(ExecutionRecord::try_from)
        .transpose()
    }

    async fn list_results(&self, solution_id: SolutionId) -> AppResult<Vec<ExecutionRecord>> {
        sqlx::query_as::<_, ResultRow>(
            "SELECT * FROM execution_results WHERE solution_id = $1 ORDER BY test_case_id",
        )
        .bind(solution_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(ExecutionRecord::try_from)
        .collect()
    }
}
