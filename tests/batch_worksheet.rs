use std::io::Cursor;
use std::sync::Arc;

use audit_report::clients::CannedRecommender;
use audit_report::export::ExportFormat;
use audit_report::report::Priority;
use audit_report::run_batch;
use audit_report::session::ReportSession;
use tempfile::tempdir;

fn write_png(path: &std::path::Path) {
    let img = image::RgbImage::from_pixel(16, 12, image::Rgb([90, 90, 90]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    std::fs::write(path, buf.into_inner()).unwrap();
}

#[tokio::test]
async fn worksheet_builds_and_exports_report() {
    let dir = tempdir().unwrap();
    write_png(&dir.path().join("railing.png"));
    let worksheet = dir.path().join("walkthrough.csv");
    std::fs::write(
        &worksheet,
        "Observation,Image,Priority\n\
         leak near pump,,high\n\
         loose railing,railing.png,\n\
         ,,low\n\
         frayed sling,missing.png,medium\n\
         blocked exit,,urgent\n\
         oil on stairs,,LOW\n",
    )
    .unwrap();
    let out = dir.path().join("out");

    let mut session = ReportSession::new(Arc::new(CannedRecommender::new()));
    let stats = run_batch(&mut session, &worksheet, &ExportFormat::ALL, &out)
        .await
        .unwrap();

    assert_eq!(stats.rows, 6);
    assert_eq!(stats.added, 3);
    assert_eq!(stats.skipped, 3);
    assert_eq!(stats.skipped_lines, vec![4, 5, 6]);
    assert_eq!(
        stats.exported,
        vec![out.join("audit_report.csv"), out.join("audit_report.pdf")]
    );

    // last row is newest
    let texts: Vec<&str> = session
        .list()
        .iter()
        .map(|o| o.observation_text())
        .collect();
    assert_eq!(texts, vec!["oil on stairs", "loose railing", "leak near pump"]);
    let report = session.list();
    assert_eq!(report.get(0).unwrap().priority(), Priority::Low);
    assert_eq!(report.get(1).unwrap().priority(), Priority::Medium);
    assert!(report.get(1).unwrap().image().is_some());
    assert_eq!(report.get(2).unwrap().priority(), Priority::High);

    let csv = std::fs::read_to_string(out.join("audit_report.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "Sr. No.,Priority,Observation,Recommendation");
    assert!(lines[1].starts_with("3,Low,oil on stairs,"));
    assert!(lines[3].starts_with("1,High,leak near pump,"));

    let pdf = std::fs::read(out.join("audit_report.pdf")).unwrap();
    let doc = lopdf::Document::load_mem(&pdf).unwrap();
    assert!(!doc.get_pages().is_empty());
}

#[tokio::test]
async fn skipped_rows_report_their_starting_line() {
    let dir = tempdir().unwrap();
    let worksheet = dir.path().join("notes.csv");
    std::fs::write(
        &worksheet,
        "Observation,Image,Priority\n\
         \"scaffold on level 2:\nboards warped\nno toe boards\",,high\n\
         blocked exit,,urgent\n\
         \"hose across\nwalkway\",,low\n\
         ,,medium\n",
    )
    .unwrap();

    let mut session = ReportSession::new(Arc::new(CannedRecommender::new()));
    let stats = run_batch(&mut session, &worksheet, &[], dir.path())
        .await
        .unwrap();

    assert_eq!(stats.rows, 4);
    assert_eq!(stats.added, 2);
    assert_eq!(stats.skipped_lines, vec![5, 8]);
    assert_eq!(
        session.list().get(1).unwrap().observation_text(),
        "scaffold on level 2:\nboards warped\nno toe boards"
    );
    assert!(stats.exported.is_empty());
}

#[tokio::test]
async fn missing_worksheet_is_an_error() {
    let dir = tempdir().unwrap();
    let mut session = ReportSession::new(Arc::new(CannedRecommender::new()));
    let result = run_batch(
        &mut session,
        &dir.path().join("nope.csv"),
        &[ExportFormat::Csv],
        dir.path(),
    )
    .await;
    assert!(result.is_err());
    assert!(!dir.path().join("audit_report.csv").exists());
}
