//! Jobs page - every job with live progress, bulk delete and a demo launcher.

use std::collections::HashSet;

use dioxus::prelude::*;
use jobs_core::{Job, JobId};

use crate::admin::JobTable;
use crate::use_progress_board;

/// Jobs list page component.
#[component]
pub fn AdminJobsPage() -> Element {
    let mut jobs = use_signal(Vec::<Job>::new);
    let mut loading = use_signal(|| true);
    let mut error = use_signal(|| None::<String>);
    let mut notice = use_signal(|| None::<String>);
    let mut selected = use_signal(HashSet::<JobId>::new);
    let mut reload = use_signal(|| 0u32);
    let mut seconds = use_signal(|| 10u64);

    let board = use_progress_board(jobs);

    let _loader = use_resource(move || {
        let _generation = reload();
        async move {
            match api::list_jobs(None, Some(200)).await {
                Ok(list) => {
                    let ids: HashSet<JobId> = list.iter().map(|job| job.id).collect();
                    selected.write().retain(|id| ids.contains(id));
                    jobs.set(list);
                }
                Err(e) => error.set(Some(format!("Failed to load jobs: {}", e))),
            }
            loading.set(false);
        }
    });

    let on_dispatch = move |_| {
        let secs = seconds();
        spawn(async move {
            match api::dispatch_demo_job(secs).await {
                Ok(id) => {
                    notice.set(Some(format!("Dispatched job {}", id)));
                    reload += 1;
                }
                Err(e) => error.set(Some(format!("Failed to dispatch job: {}", e))),
            }
        });
    };

    let on_delete = move |_| {
        let ids: Vec<String> = selected.read().iter().map(ToString::to_string).collect();
        if ids.is_empty() {
            return;
        }
        spawn(async move {
            match api::delete_jobs(ids).await {
                Ok(deleted) => {
                    notice.set(Some(format!("Deleted {} job(s)", deleted.len())));
                    selected.set(HashSet::new());
                    reload += 1;
                }
                Err(e) => error.set(Some(format!("Failed to delete jobs: {}", e))),
            }
        });
    };

    let on_force_cancel = move |job: Job| {
        spawn(async move {
            match api::force_cancel(job.id.to_string()).await {
                Ok(true) => {
                    notice.set(Some(format!("Stopped {}", job.label)));
                    reload += 1;
                }
                Ok(false) => notice.set(Some(format!("{} had already finished", job.label))),
                Err(e) => error.set(Some(format!("Failed to stop job: {}", e))),
            }
        });
    };

    let selected_count = selected.read().len();

    rsx! {
        div { class: "page-container",
            div { class: "page-header",
                div { class: "page-header-content",
                    h1 { class: "page-title", "Jobs" }
                    p { class: "page-description", "Background jobs and their progress" }
                }
                div { class: "page-header-actions",
                    input {
                        class: "input input-small",
                        r#type: "number",
                        min: "1",
                        value: "{seconds}",
                        oninput: move |e| {
                            if let Ok(value) = e.value().parse::<u64>() {
                                seconds.set(value.max(1));
                            }
                        },
                    }
                    button {
                        class: "btn btn-primary",
                        onclick: on_dispatch,
                        "Run fake job"
                    }
                    button {
                        class: "btn btn-danger",
                        disabled: selected_count == 0,
                        onclick: on_delete,
                        "Delete selected ({selected_count})"
                    }
                    button {
                        class: "btn",
                        onclick: move |_| reload += 1,
                        "Refresh"
                    }
                }
            }

            if let Some(err) = error() {
                div { class: "error-banner",
                    span { "{err}" }
                    button {
                        onclick: move |_| error.set(None),
                        "×"
                    }
                }
            }

            if let Some(message) = notice() {
                div { class: "notice-banner",
                    span { "{message}" }
                    button {
                        onclick: move |_| notice.set(None),
                        "×"
                    }
                }
            }

            JobTable {
                jobs: jobs(),
                board: board(),
                selected,
                loading: loading(),
                on_force_cancel,
                on_error: move |message: String| error.set(Some(message)),
            }
        }
    }
}
