use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use audit_report::clients::{GenerationError, Recommender};
use audit_report::error::ReportError;
use audit_report::export::{ExportFormat, TableOptions};
use audit_report::report::{ImageAttachment, ObservationId, Priority};
use audit_report::session::{ObservationDraft, ReportSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Echo,
    Fail,
    Blank,
}

/// Recommender that counts calls and answers according to a switchable mode
struct ScriptedRecommender {
    calls: AtomicUsize,
    reply: Mutex<Reply>,
}

impl ScriptedRecommender {
    fn with_reply(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reply: Mutex::new(reply),
        })
    }

    fn ok() -> Arc<Self> {
        Self::with_reply(Reply::Echo)
    }

    fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recommender for ScriptedRecommender {
    async fn generate(
        &self,
        text: &str,
        image: Option<&ImageAttachment>,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = *self.reply.lock().unwrap();
        match reply {
            Reply::Fail => Err(GenerationError::Status {
                status: 503,
                body: "backend unavailable".to_string(),
            }),
            Reply::Blank => Ok(String::new()),
            Reply::Echo => {
                let suffix = if image.is_some() { " (photo reviewed)" } else { "" };
                Ok(format!("Fix {}{}", text, suffix))
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn ids(session: &ReportSession) -> Vec<ObservationId> {
    session.list().iter().map(|o| o.id()).collect()
}

fn csv_lines(session: &ReportSession) -> Vec<String> {
    let export = session.export(ExportFormat::Csv).unwrap();
    String::from_utf8(export.bytes)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn successful_submission_grows_report_at_front() {
    let recommender = ScriptedRecommender::ok();
    let mut session = ReportSession::new(recommender.clone());

    for (i, text) in ["spill at dock", "missing guard", "frayed sling"].iter().enumerate() {
        let before = session.list().len();
        let id = session.submit(ObservationDraft::new(*text)).await.unwrap().id();
        assert_eq!(session.list().len(), before + 1);
        assert_eq!(session.list().get(0).unwrap().id(), id);
        assert_eq!(recommender.calls(), i + 1);
    }
}

#[tokio::test]
async fn failed_generation_leaves_report_unchanged() {
    let recommender = ScriptedRecommender::ok();
    let mut session = ReportSession::new(recommender.clone());
    session.submit(ObservationDraft::new("leak near pump")).await.unwrap();
    session.submit(ObservationDraft::new("loose railing")).await.unwrap();
    let before = ids(&session);
    assert_eq!(before.len(), 2);

    recommender.set_reply(Reply::Fail);
    let err = session
        .submit(ObservationDraft::new("frayed sling").with_priority(Priority::High))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReportError::Generation(GenerationError::Status { status: 503, .. })
    ));
    assert!(err.to_string().contains("backend unavailable"));
    assert_eq!(recommender.calls(), 3);
    assert_eq!(ids(&session), before);
    assert_eq!(session.list().get(0).unwrap().observation_text(), "loose railing");

    // the session keeps working once the backend recovers
    recommender.set_reply(Reply::Echo);
    let id = session.submit(ObservationDraft::new("frayed sling")).await.unwrap().id();
    assert_eq!(ids(&session), vec![id, before[0], before[1]]);
}

#[tokio::test]
async fn blank_recommendation_is_not_recorded() {
    let recommender = ScriptedRecommender::ok();
    let mut session = ReportSession::new(recommender.clone());
    session.submit(ObservationDraft::new("blocked exit")).await.unwrap();
    let before = ids(&session);

    recommender.set_reply(Reply::Blank);
    let err = session
        .submit(ObservationDraft::new("leak near pump"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReportError::Generation(GenerationError::Malformed(_))
    ));
    assert!(err.is_submission_error());
    assert_eq!(ids(&session), before);
}

#[tokio::test]
async fn blank_text_never_reaches_recommender() {
    let recommender = ScriptedRecommender::ok();
    let mut session = ReportSession::new(recommender.clone());

    for text in ["", "   ", "\n\t  \n"] {
        let err = session.submit(ObservationDraft::new(text)).await.unwrap_err();
        assert!(matches!(err, ReportError::Validation { .. }));
    }
    assert_eq!(recommender.calls(), 0);
    assert!(session.list().is_empty());
}

#[tokio::test]
async fn removing_unknown_id_is_noop() {
    let mut session = ReportSession::new(ScriptedRecommender::ok());
    session.submit(ObservationDraft::new("a")).await.unwrap();
    session.submit(ObservationDraft::new("b")).await.unwrap();
    let before = ids(&session);

    assert!(session.remove(ObservationId::new()).is_none());

    assert_eq!(ids(&session), before);
}

#[tokio::test]
async fn tabular_export_counts_down_serials() {
    let mut session = ReportSession::new(ScriptedRecommender::ok());
    assert!(session.export(ExportFormat::Csv).unwrap().bytes.is_empty());

    for n in 1..=5 {
        session
            .submit(ObservationDraft::new(format!("finding {}", n)))
            .await
            .unwrap();
    }
    let lines = csv_lines(&session);
    assert_eq!(lines.len(), 6);
    let serials: Vec<&str> = lines[1..]
        .iter()
        .map(|l| l.split(',').next().unwrap())
        .collect();
    assert_eq!(serials, vec!["5", "4", "3", "2", "1"]);
    assert!(lines[1].contains("finding 5"));
    assert!(lines[5].contains("finding 1"));
}

#[tokio::test]
async fn round_trip_scenario() {
    let mut session = ReportSession::new(ScriptedRecommender::ok())
        .with_table_options(TableOptions {
            include_priority: false,
        });

    let a = session
        .submit(ObservationDraft::new("leak near pump"))
        .await
        .unwrap()
        .id();
    assert_eq!(session.list().len(), 1);

    let photo = ImageAttachment::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0], Some("rail.jpg".into()));
    let b = session
        .submit(ObservationDraft::new("loose railing").with_image(photo))
        .await
        .unwrap()
        .id();
    assert_eq!(ids(&session), vec![b, a]);
    assert!(session.list().get(0).unwrap().image().is_some());
    assert!(session.list().get(1).unwrap().image().is_none());

    let lines = csv_lines(&session);
    assert_eq!(
        lines,
        vec![
            "Sr. No.,Observation,Recommendation",
            "2,loose railing,Fix loose railing (photo reviewed)",
            "1,leak near pump,Fix leak near pump",
        ]
    );

    assert!(session.remove(a).is_some());
    assert_eq!(ids(&session), vec![b]);

    session.clear();
    assert!(session.list().is_empty());
    assert!(session.export(ExportFormat::Csv).unwrap().bytes.is_empty());
}
