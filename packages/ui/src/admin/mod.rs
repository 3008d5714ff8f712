//! Admin components for the job system.

mod job_row;
mod job_table;
mod list_toggle;
pub mod pages;
mod progress_bar;
mod status_badge;

pub use job_row::JobRow;
pub use job_table::JobTable;
pub use list_toggle::{ListToggle, ToggleConfig};
pub use pages::{AdminJobDetailPage, AdminJobsPage};
pub use progress_bar::ProgressBar;
pub use status_badge::StatusBadge;
