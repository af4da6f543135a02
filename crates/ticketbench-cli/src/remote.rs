//! REST client for a Jira-style tracker.
//!
//! Implements both halves the workbench needs from a server: paged search
//! ([`RecordSource`]) and mutations ([`ActionBackend`]).

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::ops::ControlFlow;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info};
use ticketbench_core::action::{ActionBackend, ActionError, LinkType};
use ticketbench_core::record::Record;
use ticketbench_core::source::{PageOptions, RecordSource, SourceError};

const SEARCH_FIELDS: &str = "summary,description,status,labels,reporter";
const TIMEOUT: Duration = Duration::from_secs(30);

pub struct TrackerClient {
    base: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl TrackerClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
            token,
            agent: ureq::AgentBuilder::new()
                .timeout(TIMEOUT)
                .user_agent(concat!("ticketbench/", env!("CARGO_PKG_VERSION")))
                .build(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/api/2/{path}", self.base)
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let url = self.url(path);
        debug!(%method, %url, "tracker request");
        let request = self
            .agent
            .request(method, &url)
            .set("Accept", "application/json");
        match &self.token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, request: ureq::Request) -> Result<T, SourceError> {
        let response = request.call().map_err(|err| SourceError::Request(describe(err)))?;
        response
            .into_json::<T>()
            .map_err(|err| SourceError::Decode(err.to_string()))
    }

    fn send(&self, method: &str, path: &str, body: &serde_json::Value) -> Result<(), ActionError> {
        let response = self
            .request(method, path)
            .send_json(body)
            .map_err(|err| ActionError::Request(describe(err)))?;
        info!(status = response.status(), %path, "tracker updated");
        Ok(())
    }

    fn search_page(&self, query: &str, start_at: usize, max: usize) -> Result<SearchPage, SourceError> {
        let request = self
            .request("GET", "search")
            .query("jql", query)
            .query("startAt", &start_at.to_string())
            .query("maxResults", &max.to_string())
            .query("fields", SEARCH_FIELDS);
        self.get_json(request)
    }

    fn browse_url(&self, record: &Record) -> String {
        format!("{}/browse/{}", self.base, record.key)
    }
}

fn describe(err: ureq::Error) -> String {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            format!("HTTP {code}: {}", body.trim())
        }
        ureq::Error::Transport(transport) => transport.to_string(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    issues: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    id: String,
    key: String,
    #[serde(default)]
    fields: IssueFields,
}

#[derive(Debug, Default, Deserialize)]
struct IssueFields {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<Named>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    reporter: Option<Person>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Person {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl From<Issue> for Record {
    fn from(issue: Issue) -> Self {
        let fields = issue.fields;
        Self {
            id: issue.id,
            key: issue.key,
            summary: fields.summary,
            description: fields.description.unwrap_or_default(),
            status: fields.status.map(|status| status.name),
            labels: fields.labels,
            reporter: fields
                .reporter
                .and_then(|person| person.display_name.or(person.name)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkTypesEnvelope {
    issue_link_types: Option<Vec<LinkType>>,
}

impl RecordSource for TrackerClient {
    fn for_each_record(
        &self,
        query: &str,
        page: PageOptions,
        each: &mut dyn FnMut(Record) -> ControlFlow<()>,
    ) -> Result<(), SourceError> {
        let mut start_at = page.start_at;
        loop {
            let result = self.search_page(query, start_at, page.page_size)?;
            let received = result.issues.len();
            debug!(start_at, received, total = result.total, "search page");
            for issue in result.issues {
                if each(issue.into()).is_break() {
                    return Ok(());
                }
            }
            start_at += received;
            if received == 0 || start_at >= result.total {
                return Ok(());
            }
        }
    }

    fn get_record(&self, key: &str) -> Result<Option<Record>, SourceError> {
        let request = self
            .request("GET", &format!("issue/{key}"))
            .query("fields", SEARCH_FIELDS);
        match request.call() {
            Ok(response) => response
                .into_json::<Issue>()
                .map(|issue| Some(issue.into()))
                .map_err(|err| SourceError::Decode(err.to_string())),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(err) => Err(SourceError::Request(describe(err))),
        }
    }
}

impl ActionBackend for TrackerClient {
    fn add_comment(&self, record: &Record, comment: &str) -> Result<(), ActionError> {
        self.send(
            "POST",
            &format!("issue/{}/comment", record.id),
            &json!({ "body": comment }),
        )
    }

    fn add_label(&self, record: &Record, label: &str) -> Result<(), ActionError> {
        self.send(
            "PUT",
            &format!("issue/{}", record.id),
            &json!({ "update": { "labels": [{ "add": label }] } }),
        )
    }

    fn assign_user(&self, record: &Record, user: &str) -> Result<(), ActionError> {
        self.send(
            "PUT",
            &format!("issue/{}/assignee", record.id),
            &json!({ "name": user }),
        )
    }

    fn link_records(
        &self,
        link_type: &LinkType,
        inward_id: &str,
        outward_id: &str,
        comment: Option<&str>,
    ) -> Result<(), ActionError> {
        let mut body = json!({
            "type": { "name": link_type.name },
            "inwardIssue": { "id": inward_id },
            "outwardIssue": { "id": outward_id },
        });
        if let Some(comment) = comment {
            body["comment"] = json!({ "body": comment });
        }
        self.send("POST", "issueLink", &body)
    }

    fn open_in_browser(&self, record: &Record) -> Result<(), ActionError> {
        open_url(&self.browse_url(record))
    }

    fn link_types(&self) -> Result<Vec<LinkType>, ActionError> {
        let envelope: LinkTypesEnvelope = self
            .get_json(self.request("GET", "issueLinkType"))
            .map_err(|err| match err {
                SourceError::Request(msg) => ActionError::Request(msg),
                SourceError::Decode(msg) => ActionError::Decode(msg),
            })?;
        envelope
            .issue_link_types
            .ok_or_else(|| ActionError::Decode("no issueLinkTypes key".to_string()))
    }
}

/// Hand `url` to the platform's opener.
pub fn open_url(url: &str) -> Result<(), ActionError> {
    let opener = ["xdg-open", "open", "wslview"]
        .into_iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| ActionError::Browser("no xdg-open or open on PATH".to_string()))?;
    Command::new(&opener)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| ActionError::Browser(format!("{}: {err}", opener.display())))?;
    info!(%url, "opened in browser");
    Ok(())
}
