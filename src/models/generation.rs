use tokio::time::Instant;

/// Poll-loop state of an in-flight generation request.
#[derive(Debug, Clone, PartialEq)]
pub enum PollState {
    Pending,
    Completed(Vec<String>),
    Failed(String),
}

/// One submitted request to the generative-image service.
///
/// Created on submission, advanced only by the polling loop, dropped once
/// the loop exits with a terminal state or the ceiling is hit.
#[derive(Debug)]
pub struct GenerationJob {
    pub job_id: String,
    pub submitted_at: Instant,
    pub state: PollState,
}

impl GenerationJob {
    pub fn new(job_id: String) -> Self {
        Self {
            job_id,
            submitted_at: Instant::now(),
            state: PollState::Pending,
        }
    }

    /// Whether the job has been polling longer than `ceiling`.
    pub fn expired(&self, ceiling: std::time::Duration) -> bool {
        self.submitted_at.elapsed() >= ceiling
    }
}
