/// One row of `vtq_jobs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub queue: String,
    pub payload: Vec<u8>,
    pub visible_at: i64,
    pub created_at: i64,
    pub attempts: i64,
}
