//! Job record operations.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use tracing::info;

use super::Database;
use super::models::{Job, JobStatus};
use crate::error::{DatabaseError, ServiceError, ServiceResult};

impl Database {
    /// Create a new job record in `pending` state and return its id
    pub fn create_job(&self, job_name: &str, description: Option<&str>) -> ServiceResult<i64> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO jobs (job_name, status, start_time, description) VALUES (?1, ?2, ?3, ?4)",
            params![
                job_name,
                JobStatus::Pending.as_str(),
                Utc::now().to_rfc3339(),
                description,
            ],
        )
        .map_err(DatabaseError::Query)?;

        let job_id = conn.last_insert_rowid();
        info!(job_id, job_name, "Job created");
        Ok(job_id)
    }

    /// Update a job's status, setting `end_time` on terminal states.
    ///
    /// Returns false when the job does not exist. Transitions are not
    /// validated; any status may follow any other.
    pub fn update_job(
        &self,
        job_id: i64,
        status: JobStatus,
        description: Option<&str>,
    ) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let end_time = status.is_terminal().then(|| Utc::now().to_rfc3339());

        let updated = conn
            .execute(
                "UPDATE jobs SET status = ?2, end_time = COALESCE(?3, end_time), \
                 description = COALESCE(?4, description) WHERE id = ?1",
                params![job_id, status.as_str(), end_time, description],
            )
            .map_err(DatabaseError::Query)?;

        if updated > 0 {
            info!(job_id, status = status.as_str(), "Job updated");
        }
        Ok(updated > 0)
    }

    /// Get a job by id
    pub fn get_job(&self, job_id: i64) -> ServiceResult<Option<Job>> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT id, job_name, status, start_time, end_time, description \
             FROM jobs WHERE id = ?1",
            params![job_id],
            job_from_row,
        )
        .optional()
        .map_err(DatabaseError::Query)
        .map_err(ServiceError::from)
    }

    /// List jobs, newest first
    pub fn list_jobs(&self, limit: i64, offset: i64) -> ServiceResult<Vec<Job>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, job_name, status, start_time, end_time, description \
                 FROM jobs ORDER BY start_time DESC, id DESC LIMIT ?1 OFFSET ?2",
            )
            .map_err(DatabaseError::Query)?;

        let jobs = stmt
            .query_map(params![limit, offset], job_from_row)
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(jobs)
    }
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    let status_str: String = row.get(2)?;
    let start_time: String = row.get(3)?;
    let end_time: Option<String> = row.get(4)?;

    Ok(Job {
        id: row.get(0)?,
        job_name: row.get(1)?,
        status: JobStatus::parse(&status_str).unwrap_or(JobStatus::Aborted),
        start_time: parse_timestamp(&start_time),
        end_time: end_time.as_deref().map(parse_timestamp),
        description: row.get(5)?,
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_get_job() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_job("Find Obligations", None).unwrap();

        let job = db.get_job(id).unwrap().expect("job exists");
        assert_eq!(job.job_name, "Find Obligations");
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.end_time.is_none());
    }

    #[test]
    fn terminal_update_sets_end_time() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_job("Generate File Summary", None).unwrap();

        assert!(db.update_job(id, JobStatus::Specific, None).unwrap());
        let job = db.get_job(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Specific);
        assert!(job.end_time.is_none());

        assert!(db.update_job(id, JobStatus::Completed, None).unwrap());
        let job = db.get_job(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.end_time.is_some());
    }

    #[test]
    fn any_transition_is_accepted() {
        // Deliberate simplification: status changes are not validated.
        let db = Database::open_in_memory().unwrap();
        let id = db.create_job("Find Risks", None).unwrap();

        assert!(db.update_job(id, JobStatus::Completed, None).unwrap());
        assert!(db.update_job(id, JobStatus::Pending, None).unwrap());
        let job = db.get_job(id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn update_missing_job_returns_false() {
        let db = Database::open_in_memory().unwrap();
        assert!(!db.update_job(999, JobStatus::Aborted, None).unwrap());
    }

    #[test]
    fn list_jobs_newest_first_with_paging() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            db.create_job(&format!("job-{i}"), None).unwrap();
        }

        let page = db.list_jobs(2, 0).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].job_name, "job-4");

        let rest = db.list_jobs(10, 2).unwrap();
        assert_eq!(rest.len(), 3);
        assert_eq!(rest[0].job_name, "job-2");
    }

    #[test]
    fn description_is_preserved_unless_replaced() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_job("Q&A on Documents", Some("two questions")).unwrap();

        db.update_job(id, JobStatus::Completed, None).unwrap();
        let job = db.get_job(id).unwrap().unwrap();
        assert_eq!(job.description.as_deref(), Some("two questions"));

        db.update_job(id, JobStatus::Completed, Some("done")).unwrap();
        let job = db.get_job(id).unwrap().unwrap();
        assert_eq!(job.description.as_deref(), Some("done"));
    }
}
