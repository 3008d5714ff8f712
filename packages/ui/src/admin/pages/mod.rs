//! Admin page components for route-based navigation.

mod job_detail_page;
mod jobs_page;

pub use job_detail_page::AdminJobDetailPage;
pub use jobs_page::AdminJobsPage;
