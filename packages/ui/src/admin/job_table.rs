//! Job table with selection.

use std::collections::HashSet;

use dioxus::prelude::*;
use jobs_core::{Job, JobId, ProgressBoard};

use super::JobRow;

/// Props for JobTable component.
#[derive(Props, Clone, PartialEq)]
pub struct JobTableProps {
    pub jobs: Vec<Job>,
    pub board: ProgressBoard,
    pub selected: Signal<HashSet<JobId>>,
    pub on_force_cancel: EventHandler<Job>,
    pub on_error: EventHandler<String>,
    #[props(default = false)]
    pub loading: bool,
}

/// Table of jobs with live progress.
#[component]
pub fn JobTable(props: JobTableProps) -> Element {
    let mut selected = props.selected;
    let all_ids: Vec<JobId> = props.jobs.iter().map(|job| job.id).collect();
    let all_selected = !all_ids.is_empty() && all_ids.iter().all(|id| selected.read().contains(id));

    rsx! {
        div { class: "job-list",
            if props.loading {
                div { class: "loading", "Loading jobs..." }
            } else if props.jobs.is_empty() {
                div { class: "empty-state",
                    p { "No jobs yet" }
                }
            } else {
                table { class: "job-table",
                    thead {
                        tr {
                            th {
                                input {
                                    r#type: "checkbox",
                                    checked: all_selected,
                                    onchange: move |e| {
                                        if e.checked() {
                                            selected.set(all_ids.iter().copied().collect());
                                        } else {
                                            selected.set(HashSet::new());
                                        }
                                    },
                                }
                            }
                            th { "Label" }
                            th { "Status" }
                            th { "Progress" }
                            th { "Owner" }
                            th { "Created" }
                            th { "Actions" }
                        }
                    }
                    tbody {
                        for job in props.jobs.iter() {
                            {
                                let id = job.id;
                                rsx! {
                                    JobRow {
                                        key: "{id}",
                                        job: job.clone(),
                                        tracked: props.board.get(id).cloned(),
                                        selected: selected.read().contains(&id),
                                        on_select: move |checked: bool| {
                                            if checked {
                                                selected.write().insert(id);
                                            } else {
                                                selected.write().remove(&id);
                                            }
                                        },
                                        on_force_cancel: props.on_force_cancel,
                                        on_error: props.on_error,
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
