// Dioxus `rsx!` macro expands to unwraps internally; allow to avoid false positives.
#![allow(clippy::disallowed_methods)]

use dioxus::prelude::*;

use ui::admin::{AdminJobDetailPage, AdminJobsPage};

#[derive(Debug, Clone, Routable, PartialEq)]
#[rustfmt::skip]
enum Route {
    #[layout(AdminLayout)]
        #[route("/")]
        Root {},
        #[route("/admin")]
        AdminRedirect {},
        #[route("/admin/jobs")]
        AdminJobs {},
        #[route("/admin/jobs/:job_id")]
        AdminJobDetail { job_id: String },
}

const ADMIN_CSS: Asset = asset!("/assets/admin.css");

#[cfg(not(feature = "server"))]
fn main() {
    dioxus::launch(App);
}

#[cfg(feature = "server")]
fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // The event stream is a plain route next to the server functions.
    dioxus::serve(|| async move {
        let state = api::ensure_initialized()
            .await
            .map_err(std::io::Error::other)?;
        Ok(dioxus::server::router(App).merge(api::events_router(state.manager.clone())))
    });
}

#[component]
fn App() -> Element {
    rsx! {
        document::Link { rel: "stylesheet", href: ADMIN_CSS }

        Router::<Route> {}
    }
}

/// Layout for admin routes with sidebar navigation.
#[component]
fn AdminLayout() -> Element {
    rsx! {
        div { class: "admin-layout",
            aside { class: "admin-sidebar",
                div { class: "sidebar-header",
                    h1 { class: "sidebar-logo", "Jobs" }
                }
                nav { class: "sidebar-nav",
                    div { class: "nav-section",
                        span { class: "nav-section-title", "Menu" }
                        Link {
                            to: Route::AdminJobs {},
                            class: "nav-link",
                            active_class: "active",
                            span { class: "nav-icon", "▦" }
                            span { "All jobs" }
                        }
                    }
                }
            }

            main { class: "admin-main",
                Outlet::<Route> {}
            }
        }
    }
}

/// Redirect / to /admin/jobs.
#[component]
fn Root() -> Element {
    rsx! {
        AdminRedirect {}
    }
}

/// Redirect /admin to /admin/jobs.
#[component]
fn AdminRedirect() -> Element {
    let nav = use_navigator();
    use_effect(move || {
        nav.push(Route::AdminJobs {});
    });
    rsx! {}
}

/// Jobs list page.
#[component]
fn AdminJobs() -> Element {
    rsx! {
        AdminJobsPage {}
    }
}

/// Job detail page.
#[component]
fn AdminJobDetail(job_id: String) -> Element {
    rsx! {
        AdminJobDetailPage { job_id }
    }
}
