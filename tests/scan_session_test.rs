//! Scan session tests against in-memory backends.
//!
//! Covers native matching with glyph refinement, OCR of scanned pages,
//! orientation correction, cache lifetime and manual matches.

mod common;

use common::*;
use redactkit::error::RedactorError;
use redactkit::transform::Rotation;
use redactkit::{EngineConfig, Rect, ScanMode, ScanProgress, Session};

fn session_with(factory: FakeOcrFactory, config: EngineConfig) -> Session {
    Session::new(config, Box::new(factory)).unwrap()
}

fn load(session: &mut Session, renderer: FakeRenderer) {
    session.load(Box::new(renderer));
}

/// One scanned page reading "Invoice 12-05-2024 Amount".
fn invoice_script() -> ScriptedPage {
    ScriptedPage::new(LETTER.width).with_line(&[
        ("Invoice", Rect::new(72.0, 100.0, 130.0, 112.0)),
        ("12-05-2024", Rect::new(136.0, 100.0, 210.0, 112.0)),
        ("Amount", Rect::new(216.0, 100.0, 270.0, 112.0)),
    ])
}

mod native_text {
    use super::*;

    #[test]
    fn test_email_uses_glyph_quads() {
        let page = FakePage::new(LETTER)
            .with_block(native_line(
                &[("Contact:", 72.0, 120.0), ("jane@example.com", 124.0, 230.0)],
                100.0,
                112.0,
            ))
            .with_quads("jane@example.com", vec![Rect::new(125.5, 101.0, 228.25, 111.0)]);
        let mut session = session_with(FakeOcrFactory::default(), EngineConfig::default());
        load(&mut session, FakeRenderer::new(vec![page]));

        let matches = session.scan(&["email"]).unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text, "jane@example.com");
        assert_eq!(matches[0].term, "email");
        assert_eq!(matches[0].page, 0);
        assert!(!matches[0].is_manual);
        assert_eq!(matches[0].bbox, Rect::new(125.5, 101.0, 228.25, 111.0));
    }

    #[test]
    fn test_native_page_never_reaches_ocr() {
        let factory = FakeOcrFactory::default();
        let stats = factory.stats.clone();
        let page = FakePage::new(LETTER).with_block(native_line(&[("hello", 10.0, 40.0)], 10.0, 20.0));
        let mut session = session_with(factory, EngineConfig::default());
        load(&mut session, FakeRenderer::new(vec![page]));

        session.scan(&["hello"]).unwrap();

        assert_eq!(stats.recognized(), 0);
        assert_eq!(stats.created.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_repeated_literal_gets_distinct_glyph_runs() {
        let page = FakePage::new(LETTER)
            .with_block(native_line(
                &[("a@b.io", 10.0, 40.0), ("and", 45.0, 60.0), ("a@b.io", 65.0, 95.0)],
                100.0,
                110.0,
            ))
            .with_quads(
                "a@b.io",
                vec![Rect::new(66.0, 101.0, 94.0, 109.0), Rect::new(11.0, 101.0, 39.0, 109.0)],
            );
        let mut session = session_with(FakeOcrFactory::default(), EngineConfig::default());
        load(&mut session, FakeRenderer::new(vec![page]));

        let matches = session.scan(&["email"]).unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].bbox, Rect::new(11.0, 101.0, 39.0, 109.0));
        assert_eq!(matches[1].bbox, Rect::new(66.0, 101.0, 94.0, 109.0));
    }

    #[test]
    fn test_glyphs_on_another_line_are_ignored() {
        let page = FakePage::new(LETTER)
            .with_block(native_line(&[("a@b.io", 10.0, 40.0)], 100.0, 110.0))
            .with_quads("a@b.io", vec![Rect::new(10.0, 300.0, 40.0, 310.0)]);
        let mut session = session_with(FakeOcrFactory::default(), EngineConfig::default());
        load(&mut session, FakeRenderer::new(vec![page]));

        let matches = session.scan(&["email"]).unwrap();

        assert_eq!(matches[0].bbox, Rect::new(10.0, 100.0, 40.0, 110.0));
    }

    #[test]
    fn test_failed_search_keeps_estimate() {
        let page = FakePage::new(LETTER).with_block(native_line(
            &[("call", 10.0, 30.0), ("555-234-5678", 35.0, 95.0)],
            50.0,
            60.0,
        ));
        let renderer = FakeRenderer::new(vec![page]).failing_search();
        let mut session = session_with(FakeOcrFactory::default(), EngineConfig::default());
        load(&mut session, renderer);

        let matches = session.scan(&["phone"]).unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].bbox, Rect::new(35.0, 50.0, 95.0, 60.0));
    }

    #[test]
    fn test_search_runs_once_per_literal_and_page() {
        let page = FakePage::new(LETTER)
            .with_block(native_line(&[("x@y.io", 10.0, 40.0)], 10.0, 20.0))
            .with_block(native_line(&[("x@y.io", 10.0, 40.0)], 30.0, 40.0));
        let renderer = FakeRenderer::new(vec![page]);
        let stats = renderer.stats.clone();
        let mut session = session_with(FakeOcrFactory::default(), EngineConfig::default());
        load(&mut session, renderer);

        assert_eq!(session.scan(&["email"]).unwrap().len(), 2);
        assert_eq!(stats.searches.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_padding_grows_automatic_boxes() {
        let page = FakePage::new(LETTER).with_block(native_line(&[("secret", 10.0, 40.0)], 10.0, 20.0));
        let config = EngineConfig::default().with_bbox_padding(2.0);
        let mut session = session_with(FakeOcrFactory::default(), config);
        load(&mut session, FakeRenderer::new(vec![page]));

        let matches = session.scan(&["SECRET"]).unwrap();

        assert_eq!(matches[0].bbox, Rect::new(8.0, 8.0, 42.0, 22.0));
        assert_eq!(matches[0].term, "SECRET");
    }

    #[test]
    fn test_uniform_block_interpolates_by_character() {
        let page = FakePage::new(LETTER).with_block(redactkit::TextBlock::uniform(
            "id 0123456789",
            Rect::new(0.0, 0.0, 130.0, 10.0),
            redactkit::TextSource::Native,
        ));
        let mut session = session_with(FakeOcrFactory::default(), EngineConfig::default());
        load(&mut session, FakeRenderer::new(vec![page]));

        let matches = session.scan(&[r"\d{10}"]).unwrap();

        assert_eq!(matches.len(), 1);
        assert!(matches[0].bbox.approx_eq(&Rect::new(30.0, 0.0, 130.0, 10.0), 1e-3));
    }
}

mod ocr {
    use super::*;

    #[test]
    fn test_scanned_invoice_date() {
        let factory = FakeOcrFactory::new(vec![(0, invoice_script())]);
        let stats = factory.stats.clone();
        let mut session = session_with(factory, EngineConfig::default());
        load(&mut session, FakeRenderer::new(vec![FakePage::scanned(LETTER)]));

        let matches = session.scan(&["date"]).unwrap().to_vec();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text, "12-05-2024");
        assert_eq!(matches[0].term, "date");
        assert!(
            matches[0].bbox.approx_eq(&Rect::new(136.0, 100.0, 210.0, 112.0), 0.01),
            "bbox {:?}",
            matches[0].bbox
        );
        assert_eq!(stats.recognized(), 1);
        assert_eq!(session.rotation(0), Rotation::None);
    }

    #[test]
    fn test_auto_mode_only_ocrs_blank_pages() {
        let factory = FakeOcrFactory::new(vec![(1, invoice_script())]);
        let stats = factory.stats.clone();
        let pages = vec![
            FakePage::new(LETTER).with_block(native_line(&[("due", 0.0, 20.0), ("01-02-2023", 25.0, 80.0)], 0.0, 10.0)),
            FakePage::scanned(LETTER),
        ];
        let mut session = session_with(factory, EngineConfig::default());
        load(&mut session, FakeRenderer::new(pages));

        let matches = session.scan(&["date"]).unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].page, 0);
        assert_eq!(matches[1].page, 1);
        assert_eq!(stats.recognized(), 1);
    }

    #[test]
    fn test_native_mode_skips_scanned_pages() {
        let factory = FakeOcrFactory::new(vec![(0, invoice_script())]);
        let stats = factory.stats.clone();
        let config = EngineConfig::default().with_scan_mode(ScanMode::Native);
        let mut session = session_with(factory, config);
        load(&mut session, FakeRenderer::new(vec![FakePage::scanned(LETTER)]));

        assert!(session.scan(&["date"]).unwrap().is_empty());
        assert_eq!(stats.recognized(), 0);
    }

    #[test]
    fn test_rescan_reuses_cached_blocks() {
        let factory = FakeOcrFactory::new(vec![(0, invoice_script())]);
        let stats = factory.stats.clone();
        let mut session = session_with(factory, EngineConfig::default());
        load(&mut session, FakeRenderer::new(vec![FakePage::scanned(LETTER)]));

        assert!(!session.has_ocr_text(0));
        let first = session.scan(&["date"]).unwrap().to_vec();
        assert!(session.has_ocr_text(0));
        let second = session.scan(&["date"]).unwrap().to_vec();

        assert_eq!(first, second);
        assert_eq!(stats.recognized(), 1);

        let amounts = session.scan(&["amount"]).unwrap();
        assert_eq!(amounts.len(), 1);
        assert_eq!(stats.recognized(), 1);
    }

    #[test]
    fn test_loading_a_document_invalidates_caches() {
        let factory = FakeOcrFactory::new(vec![(0, invoice_script())]);
        let stats = factory.stats.clone();
        let mut session = session_with(factory, EngineConfig::default());
        load(&mut session, FakeRenderer::new(vec![FakePage::scanned(LETTER)]));
        session.scan(&["date"]).unwrap();
        session.add_manual_match(0, Rect::new(0.0, 0.0, 50.0, 50.0)).unwrap();

        assert!(session.has_ocr_text(0));

        load(&mut session, FakeRenderer::new(vec![FakePage::scanned(LETTER)]));
        assert!(session.matches().is_empty());
        assert!(!session.has_ocr_text(0));

        session.scan(&["date"]).unwrap();
        assert_eq!(stats.recognized(), 2);
    }

    #[test]
    fn test_rotated_scan_is_corrected() {
        let script = ScriptedPage::new(LETTER.width)
            .rotated(90.0, 8.0)
            .with_line(&[
                ("Invoice", Rect::new(72.0, 100.0, 130.0, 112.0)),
                ("12-05-2024", Rect::new(136.0, 100.0, 210.0, 112.0)),
            ]);
        let mut session = session_with(FakeOcrFactory::new(vec![(0, script)]), EngineConfig::default());
        load(&mut session, FakeRenderer::new(vec![FakePage::scanned(LETTER_LANDSCAPE)]));

        let matches = session.scan(&["date"]).unwrap().to_vec();

        assert_eq!(session.rotation(0), Rotation::Cw90);
        let geometry = session.page_geometry(0, 1.0).unwrap();
        assert_eq!((geometry.width, geometry.height), (612.0, 792.0));
        assert_eq!(matches.len(), 1);
        assert!(matches[0].bbox.approx_eq(&Rect::new(136.0, 100.0, 210.0, 112.0), 0.01));

        let (preview, _) = session.render_preview(0, 1.0).unwrap();
        assert_eq!(preview.dimensions(), (612, 792));
    }

    #[test]
    fn test_low_confidence_orientation_keeps_page_upright() {
        let script = ScriptedPage::new(LETTER.width).rotated(180.0, 0.5);
        let mut config = EngineConfig::default();
        config.orientation_min_confidence = 2.0;
        let mut session = session_with(FakeOcrFactory::new(vec![(0, script)]), config);
        load(&mut session, FakeRenderer::new(vec![FakePage::scanned(LETTER)]));

        session.scan(&["date"]).unwrap();

        assert_eq!(session.rotation(0), Rotation::None);
    }

    #[test]
    fn test_missing_detector_assumes_upright() {
        let factory = FakeOcrFactory::new(vec![(0, invoice_script())]).without_detector();
        let mut session = session_with(factory, EngineConfig::default());
        load(&mut session, FakeRenderer::new(vec![FakePage::scanned(LETTER)]));

        assert_eq!(session.scan(&["date"]).unwrap().len(), 1);
        assert_eq!(session.rotation(0), Rotation::None);
    }

    #[test]
    fn test_ocr_mode_maps_native_text_into_corrected_space() {
        let script = ScriptedPage::new(LETTER.width).rotated(90.0, 8.0);
        let page = FakePage::new(LETTER_LANDSCAPE)
            .with_block(native_line(&[("a@b.io", 100.0, 160.0)], 50.0, 60.0));
        let config = EngineConfig::default().with_scan_mode(ScanMode::Ocr);
        let mut session = session_with(FakeOcrFactory::new(vec![(0, script)]), config);
        load(&mut session, FakeRenderer::new(vec![page]));

        let matches = session.scan(&["email"]).unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].bbox, Rect::new(552.0, 100.0, 562.0, 160.0));
    }

    #[test]
    fn test_engine_init_failure_keeps_previous_state() {
        let mut session = session_with(FakeOcrFactory::failing_init(), EngineConfig::default());
        load(&mut session, FakeRenderer::new(vec![FakePage::scanned(LETTER)]));
        session.add_manual_match(0, Rect::new(1.0, 1.0, 20.0, 20.0)).unwrap();

        let err = session.scan(&["date"]).unwrap_err();

        assert!(matches!(err, RedactorError::OcrInit { .. }), "{}", err);
        assert_eq!(session.matches().len(), 1);
        assert!(session.matches()[0].is_manual);
    }

    #[test]
    fn test_recognition_failure_fails_the_scan() {
        let factory = FakeOcrFactory::new(vec![(0, invoice_script()), (1, ScriptedPage::new(LETTER.width).failing())]);
        let mut session = session_with(factory, EngineConfig::default());
        load(
            &mut session,
            FakeRenderer::new(vec![FakePage::scanned(LETTER), FakePage::scanned(LETTER)]),
        );

        let err = session.scan(&["date"]).unwrap_err();

        assert!(matches!(err, RedactorError::Ocr { page: 1, .. }), "{}", err);
        assert!(session.matches().is_empty());
    }

    #[test]
    fn test_render_failure_on_ocr_page_fails_the_scan() {
        let factory = FakeOcrFactory::new(vec![(0, invoice_script())]).without_detector();
        let mut session = session_with(factory, EngineConfig::default());
        load(
            &mut session,
            FakeRenderer::new(vec![FakePage::scanned(LETTER)]).failing_render(0),
        );

        let err = session.scan(&["date"]).unwrap_err();

        assert!(matches!(err, RedactorError::Render { page: 0, .. }), "{}", err);
    }

    #[test]
    fn test_progress_reports_every_stage() {
        let factory = FakeOcrFactory::new(vec![(1, invoice_script())]);
        let pages = vec![
            FakePage::new(LETTER).with_block(native_line(&[("text", 0.0, 20.0)], 0.0, 10.0)),
            FakePage::scanned(LETTER),
        ];
        let mut session = session_with(factory, EngineConfig::default());
        load(&mut session, FakeRenderer::new(pages));

        let mut events = Vec::new();
        session
            .scan_with_progress(&["date"], &mut |p| events.push(p))
            .unwrap();

        assert_eq!(
            events,
            vec![
                ScanProgress::ExtractingText { page: 0, total: 2 },
                ScanProgress::ExtractingText { page: 1, total: 2 },
                ScanProgress::Recognizing { completed: 1, total: 1 },
                ScanProgress::Matching { page: 0, total: 2 },
                ScanProgress::Matching { page: 1, total: 2 },
            ]
        );
    }
}

mod manual_matches {
    use super::*;

    fn native_session() -> Session {
        let page = FakePage::new(LETTER).with_block(native_line(&[("x@y.io", 300.0, 340.0)], 10.0, 20.0));
        let mut session = session_with(FakeOcrFactory::default(), EngineConfig::default());
        load(&mut session, FakeRenderer::new(vec![page.clone(), page]));
        session
    }

    #[test]
    fn test_rescan_keeps_manual_matches_first() {
        let mut session = native_session();
        session.scan(&["email"]).unwrap();
        session.add_manual_match(1, Rect::new(50.0, 40.0, 10.0, 20.0)).unwrap();

        let first = session.scan(&["email"]).unwrap().to_vec();
        let second = session.scan(&["email"]).unwrap().to_vec();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert!(first[0].is_manual);
        assert_eq!(first[0].bbox, Rect::new(10.0, 20.0, 50.0, 40.0));
        assert_eq!(first[0].term, "manual");
        assert_eq!((first[1].page, first[2].page), (0, 1));
    }

    #[test]
    fn test_blank_terms_clear_only_automatic_matches() {
        let mut session = native_session();
        session.scan(&["email"]).unwrap();
        session.add_manual_match(0, Rect::new(0.0, 0.0, 10.0, 10.0)).unwrap();

        let matches = session.scan(&["  ", ""]).unwrap();

        assert_eq!(matches.len(), 1);
        assert!(matches[0].is_manual);
    }

    #[test]
    fn test_small_drag_is_ignored() {
        let mut session = native_session();

        let result = session
            .commit_drag(0, Rect::new(10.0, 10.0, 13.0, 20.0), 2.0, 0.5)
            .unwrap();

        assert!(result.is_none());
        assert!(session.matches().is_empty());
    }

    #[test]
    fn test_drag_maps_display_to_page_space() {
        let mut session = native_session();

        let matches = session
            .commit_drag(0, Rect::new(40.0, 60.0, 20.0, 30.0), 2.0, 0.5)
            .unwrap()
            .expect("drag accepted")
            .to_vec();

        assert_eq!(matches.len(), 1);
        assert!(matches[0].is_manual);
        assert_eq!(matches[0].bbox, Rect::new(20.0, 30.0, 40.0, 60.0));

        let overlays = session.overlays(0, 2.0, 0.5);
        assert_eq!(overlays.len(), 1);
        assert!(overlays[0].is_manual);
        assert_eq!(overlays[0].rect, Rect::new(20.0, 30.0, 40.0, 60.0));
        assert!(session.overlays(1, 2.0, 0.5).is_empty());
    }

    #[test]
    fn test_drag_on_missing_page_is_rejected() {
        let mut session = native_session();

        let err = session
            .commit_drag(7, Rect::new(0.0, 0.0, 40.0, 40.0), 1.0, 1.0)
            .unwrap_err();

        assert!(matches!(err, RedactorError::InvalidInput { .. }));
    }

    #[test]
    fn test_remove_and_restore() {
        let mut session = native_session();
        let saved = session.scan(&["email"]).unwrap().to_vec();

        let removed = session.remove_match(0).unwrap();
        assert_eq!(removed, saved[0]);
        assert_eq!(session.matches().len(), 1);
        assert!(session.remove_match(5).is_none());

        let restored = session.restore_matches(saved.clone()).unwrap();
        assert_eq!(restored, saved.as_slice());
    }

    #[test]
    fn test_restore_rejects_foreign_pages() {
        let mut session = native_session();
        let mut saved = session.scan(&["email"]).unwrap().to_vec();
        saved[0].page = 9;

        assert!(session.restore_matches(saved).is_err());
        assert_eq!(session.matches().len(), 2);
    }
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = EngineConfig::default().with_max_pool_size(0);
    assert!(Session::new(config, Box::new(FakeOcrFactory::default())).is_err());
}
