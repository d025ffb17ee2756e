//! End-to-end dispatch through the public API: templates on disk,
//! configuration from YAML, a recording mail client and pacer.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use formdispatch::config::Config;
use formdispatch::error::MailError;
use formdispatch::{
    BatchReport, Dispatcher, FsTemplateStore, MailClient, MailRequest, Pacer, SendResponse,
    SubmissionPayload,
};

#[derive(Debug, Clone)]
struct Captured {
    to: Vec<String>,
    subject: String,
    html: String,
    text: String,
    submission_id: String,
}

#[derive(Default)]
struct CapturingClient {
    sent: Mutex<Vec<Captured>>,
    reject: Option<String>,
}

#[async_trait]
impl MailClient for CapturingClient {
    fn name(&self) -> &str {
        "capturing"
    }

    async fn send_email(&self, request: MailRequest<'_>) -> Result<SendResponse, MailError> {
        let to: Vec<String> = request.delivery.recipients().map(String::from).collect();
        let rejected = self
            .reject
            .as_ref()
            .is_some_and(|addr| to.iter().any(|t| t == addr));

        let mut sent = self.sent.lock().unwrap();
        sent.push(Captured {
            to,
            subject: request.message.subject.clone(),
            html: request.message.html_body.clone(),
            text: request.message.text_body.clone(),
            submission_id: request.submission.submission_id.clone(),
        });

        if rejected {
            Ok(SendResponse::failed("550 rejected"))
        } else {
            Ok(SendResponse::sent(format!("<{}@test>", sent.len())))
        }
    }
}

#[derive(Default)]
struct CountingPacer {
    pauses: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Pacer for CountingPacer {
    async fn pause(&self, delay: Duration) {
        self.pauses.lock().unwrap().push(delay);
    }
}

const CONFIG: &str = r#"
smtp:
  host: smtp.example.com
  port: 587
  username: forms-bot
  password: secret
sender:
  from: forms@example.com
templates:
  dir: templates
dispatch:
  delay: 750ms
  subject_prefix: "[Site] "
  timezone: Europe/Paris
delivery:
  to: inbox@example.com
  overrides:
    - archive@example.com
"#;

const CONTACT_TEMPLATE: &str = r#"<html><head><style>p { color: red; }</style></head>
<body>
<h1>{{ subject }}</h1>
<p>From {{ name }} &lt;{{ email }}&gt;</p>
<p>{{ message }}</p>
<p>{{ date }} {{ time }}</p>
</body></html>"#;

fn setup() -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let templates = dir.path().join("templates");
    std::fs::create_dir(&templates).unwrap();
    std::fs::write(templates.join("contact.html"), CONTACT_TEMPLATE).unwrap();
    std::fs::write(templates.join("broken.html"), "{% if %}").unwrap();
    (dir, Config::from_yaml(CONFIG).unwrap())
}

fn payload(template_id: &str) -> SubmissionPayload {
    serde_json::from_value(serde_json::json!({
        "name": "Ada <Lovelace>",
        "email": "ada@example.com",
        "subject": "Engine inquiry",
        "message": "Can it compute?",
        "templateId": template_id,
        "submissionId": "sub-7",
        "timestamp": "2024-03-01T10:49:35Z",
        "ipAddress": "203.0.113.7",
        "destinations": [
            {"label": "sales", "address": "sales@example.com"},
            {"label": "support", "address": "support@example.com"},
            {"label": "billing", "address": "billing@example.com"}
        ]
    }))
    .unwrap()
}

fn dispatcher(
    dir: &Path,
    config: Config,
    client: Arc<CapturingClient>,
    pacer: Arc<CountingPacer>,
) -> Dispatcher {
    let runtime = config.compile(&dir.join("config.yaml")).unwrap();
    let store = FsTemplateStore::new(runtime.templates_dir.clone());
    Dispatcher::from_runtime(&runtime, client, Arc::new(store)).with_pacer(pacer)
}

#[tokio::test]
async fn custom_template_is_rendered_once_and_sent_to_each_destination() {
    let (dir, config) = setup();
    let client = Arc::new(CapturingClient::default());
    let pacer = Arc::new(CountingPacer::default());
    let dispatcher = dispatcher(dir.path(), config, client.clone(), pacer.clone());
    let before = dispatcher.settings().snapshot();

    let report = dispatcher.send_to_destinations(&payload("contact")).await;

    let report = match report {
        BatchReport::Completed(report) => report,
        other => panic!("expected completed report, got {:?}", other),
    };
    assert_eq!(report.total_sent, 3);
    assert_eq!(report.total_failed, 0);
    let labels: Vec<_> = report.outcomes.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, ["sales", "support", "billing"]);
    assert_eq!(report.outcomes[0].message_id.as_deref(), Some("<1@test>"));

    let sent = client.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].to, ["sales@example.com"]);
    assert_eq!(sent[1].to, ["support@example.com"]);
    assert_eq!(sent[2].to, ["billing@example.com"]);
    for captured in &sent {
        assert_eq!(captured.subject, "[Site] Engine inquiry");
        assert_eq!(captured.html, sent[0].html);
        assert_eq!(captured.text, sent[0].text);
        assert_eq!(captured.submission_id, "sub-7");
    }
    assert!(sent[0].html.contains("Ada &lt;Lovelace&gt;"));
    assert!(sent[0].html.contains("11:49:35 CET"));
    assert!(!sent[0].text.contains("color: red"));
    assert!(sent[0].text.starts_with("Engine inquiry From Ada <Lovelace> <ada@example.com>"));

    assert_eq!(
        pacer.pauses.lock().unwrap().as_slice(),
        [Duration::from_millis(750), Duration::from_millis(750)]
    );
    assert_eq!(dispatcher.settings().snapshot(), before);
    assert_eq!(before.primary.as_deref(), Some("inbox@example.com"));
}

#[tokio::test]
async fn broken_and_missing_templates_fall_back() {
    for template_id in ["broken", "does-not-exist", "../escape"] {
        let (dir, config) = setup();
        let client = Arc::new(CapturingClient::default());
        let dispatcher = dispatcher(
            dir.path(),
            config,
            client.clone(),
            Arc::new(CountingPacer::default()),
        );

        let report = dispatcher.send_to_destinations(&payload(template_id)).await;

        assert!(report.is_success(), "{}: {:?}", template_id, report);
        let sent = client.sent.lock().unwrap();
        assert!(sent[0].html.contains("Can it compute?"), "{}", template_id);
        assert!(sent[0].html.contains("sub-7"), "{}", template_id);
    }
}

#[tokio::test]
async fn rejected_destination_is_reported_and_others_still_sent() {
    let (dir, config) = setup();
    let client = Arc::new(CapturingClient {
        reject: Some("support@example.com".to_string()),
        ..Default::default()
    });
    let dispatcher = dispatcher(
        dir.path(),
        config,
        client.clone(),
        Arc::new(CountingPacer::default()),
    );

    let report = dispatcher.send_to_destinations(&payload("contact")).await;

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["totalSent"], 2);
    assert_eq!(json["totalFailed"], 1);
    assert_eq!(json["outcomes"][1]["label"], "support");
    assert_eq!(json["outcomes"][1]["success"], false);
    assert_eq!(json["outcomes"][1]["error"], "550 rejected");
    assert_eq!(json["outcomes"][2]["success"], true);
    assert_eq!(client.sent.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn missing_password_refuses_the_batch() {
    let (dir, _) = setup();
    let config = Config::from_yaml(&CONFIG.replace("  password: secret\n", "")).unwrap();
    let client = Arc::new(CapturingClient::default());
    let pacer = Arc::new(CountingPacer::default());
    let dispatcher = dispatcher(dir.path(), config, client.clone(), pacer.clone());

    let report = dispatcher.send_to_destinations(&payload("contact")).await;

    let failure = match report {
        BatchReport::Failed(failure) => failure,
        other => panic!("expected failure report, got {:?}", other),
    };
    assert!(!failure.success);
    assert_eq!(
        failure.error,
        "configuration error: missing required transport credential: password"
    );
    assert!(client.sent.lock().unwrap().is_empty());
    assert!(pacer.pauses.lock().unwrap().is_empty());
}
