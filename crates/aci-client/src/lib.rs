// ACI backend client
//
// PortalClient talks to the backend over reqwest and implements the aci-core
// backend traits, so a Playground or ConfigureAppWizard can run against it.
//
// Authentication:
// - project-scoped endpoints take the agent API key (`X-API-KEY`)
// - organization-scoped endpoints (projects, agents, billing) take the
//   identity token as a bearer token, plus `X-ACI-ORG-ID` where required

mod client;

mod analytics;
mod app_configs;
mod apps;
mod billing;
mod chat;
mod functions;
mod linked_accounts;
mod projects;

pub use chat::DATA_STREAM_HEADER;
pub use client::PortalClient;
