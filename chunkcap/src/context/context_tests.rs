//! Scenario tests for chunk execution capture.

#[cfg(test)]
mod tests {
    use crate::config::CaptureConfig;
    use crate::context::CaptureRuntime;
    use crate::core::{CapturePhase, ChunkKey, ConsoleStream, OutputKind, OutputRecord};
    use crate::errors::CaptureError;
    use crate::events::ConsoleEvents;
    use crate::graphics::{MockGraphicsDevice, SessionPhase};
    use crate::ledger::ChunkManifest;
    use crate::monitor::{FileChangeEvent, FileChangeKind, FileInfo};
    use crate::testing::{
        assert_console_log, assert_ordinals_contiguous, assert_record_kinds, CaptureFixture,
        ManualFileMonitor, RecordingDevice, TEST_SESSION_CONTEXT_ID,
    };
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    fn fixture() -> (tempfile::TempDir, CaptureFixture) {
        let dir = tempfile::tempdir().unwrap();
        let fixture = CaptureFixture::new(dir.path()).unwrap();
        (dir, fixture)
    }

    fn fixture_with(device: RecordingDevice) -> (tempfile::TempDir, CaptureFixture) {
        let dir = tempfile::tempdir().unwrap();
        let fixture = CaptureFixture::with_device(dir.path(), device).unwrap();
        (dir, fixture)
    }

    /// Writes a rich-content fragment with an auxiliary asset folder.
    fn write_widget(dir: &std::path::Path, asset: &[u8]) -> PathBuf {
        std::fs::create_dir_all(dir.join("lib")).unwrap();
        std::fs::write(dir.join("lib/shared.js"), asset).unwrap();
        let html = dir.join("widget.html");
        std::fs::write(&html, b"<div></div>").unwrap();
        html
    }

    #[test]
    fn test_console_plot_console_sequence() {
        let (_dir, fx) = fixture();
        let ctx = fx.context("d1", "c1").unwrap();
        ctx.connect().unwrap();
        let handle = fx.activate_graphics().unwrap();
        assert!(ctx.graphics_connected());

        fx.console().emit_output(ConsoleStream::Normal, "hi");
        let plot = fx.device.draw(1).unwrap();
        fx.monitor.emit_changes(
            &handle,
            &[FileChangeEvent::new(FileChangeKind::Added, FileInfo::file(&plot))],
        );
        fx.console().emit_output(ConsoleStream::Error, "warn");
        fx.console().emit_prompt("> ");

        let records = ctx.records();
        assert_ordinals_contiguous(&records);
        assert_record_kinds(
            &records,
            &[OutputKind::ConsoleOutput, OutputKind::Plot, OutputKind::ConsoleError],
        );

        let layout = fx.runtime.layout();
        assert_console_log(
            layout.console_log(ctx.key()),
            &[(OutputKind::ConsoleOutput, "hi"), (OutputKind::ConsoleError, "warn")],
        );
        let canonical = layout.artifact_path(ctx.key(), &OutputRecord::new(1, OutputKind::Plot));
        assert_eq!(canonical, ctx.output_dir().join("000001.png"));
        assert!(canonical.exists());
        assert!(!plot.exists());
        assert_eq!(fx.recorder.plots(), vec![canonical]);

        assert_eq!(ctx.phase(), CapturePhase::Completed);
        assert_eq!(fx.recorder.completion_count(ctx.key()), 1);
        assert_eq!(fx.recorder.plot_completions(), vec![ctx.key().clone()]);
    }

    #[test]
    fn test_prompt_before_registration_completes_immediately() {
        let (_dir, fx) = fixture();
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();

        fx.console().emit_prompt("> ");

        assert!(!ctx.graphics_connected());
        assert!(ctx.is_completed());
        assert_eq!(fx.recorder.completion_count(ctx.key()), 1);

        // the pending session is stopped with its chunk
        assert_eq!(fx.device.off_count(), 1);
        assert_eq!(fx.monitor.active_count(), 0);
        assert_eq!(ctx.graphics_session().unwrap().phase(), SessionPhase::Finished);
        assert_eq!(fx.console().prompt.subscriber_count(), 0);
        assert!(fx.activate_graphics().is_none());
        assert_eq!(ctx.phase(), CapturePhase::Completed);
    }

    #[test]
    fn test_late_registration_stays_with_its_chunk() {
        let (_dir, fx) = fixture();
        fx.monitor.set_deferred_unregister(true);
        let first = fx.context("d", "a").unwrap();
        first.connect().unwrap();
        let first_handle = fx.monitor.last_handle().unwrap();

        fx.console().emit_prompt("> ");
        assert!(first.is_completed());
        assert!(fx.monitor.unregister_requested(&first_handle));

        // the registration lands after the chunk already finished
        fx.monitor.complete_registration_from_disk(&first_handle);
        let first_session = first.graphics_session().unwrap();
        assert_eq!(first_session.phase(), SessionPhase::Arming);
        assert_eq!(fx.console().prompt.subscriber_count(), 0);

        fx.monitor.finish_unregister(&first_handle);
        assert_eq!(first_session.phase(), SessionPhase::Finished);
        assert_eq!(fx.device.off_count(), 1);

        let second = fx.context("d", "b").unwrap();
        second.connect().unwrap();
        let second_handle = fx.activate_graphics().unwrap();
        assert_ne!(second_handle, first_handle);

        fx.console().emit_prompt("> ");
        assert_eq!(second.phase(), CapturePhase::Draining);
        assert_eq!(fx.device.off_count(), 1);

        fx.monitor.finish_unregister(&second_handle);
        assert_eq!(fx.device.arm_count(), 2);
        assert_eq!(fx.device.off_count(), 2);
        assert_eq!(fx.recorder.completion_count(first.key()), 1);
        assert_eq!(fx.recorder.completion_count(second.key()), 1);
    }

    #[test]
    fn test_prompt_during_connect_leaves_nothing_attached() {
        let dir = tempfile::tempdir().unwrap();
        let console = Arc::new(ConsoleEvents::new());
        let monitor = Arc::new(ManualFileMonitor::new());

        let mut device = MockGraphicsDevice::new();
        let chatter = console.clone();
        device.expect_arm().times(1).returning(move |_| {
            chatter.emit_output(ConsoleStream::Normal, "device ready");
            chatter.emit_prompt("> ");
            Ok(())
        });
        device.expect_off().times(1).returning(|| Ok(()));

        let config = CaptureConfig::new().with_output_root(dir.path());
        let runtime = Arc::new(
            CaptureRuntime::new(config, Arc::new(device), monitor.clone())
                .unwrap()
                .with_console(console.clone()),
        );
        let ctx = runtime.context("d", "c").unwrap();
        ctx.connect().unwrap();

        assert!(ctx.is_completed());
        assert_record_kinds(&ctx.records(), &[OutputKind::ConsoleOutput]);
        assert_eq!(console.prompt.subscriber_count(), 0);
        assert_eq!(console.output.subscriber_count(), 0);
        assert_eq!(runtime.notebook().html_output.subscriber_count(), 0);
        assert_eq!(monitor.active_count(), 0);
        assert_eq!(ctx.graphics_session().unwrap().phase(), SessionPhase::Finished);
    }

    #[test]
    fn test_arm_failure_still_completes_on_prompt() {
        let (_dir, fx) = fixture_with(RecordingDevice::new().with_arm_failure("no display"));
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();

        assert_eq!(fx.sink.count("chunk.capture_degraded"), 1);
        assert_eq!(fx.monitor.registration_count(), 0);

        fx.console().emit_output(ConsoleStream::Normal, "still captured");
        fx.console().emit_prompt("> ");

        assert!(ctx.is_completed());
        assert_eq!(fx.recorder.completion_count(ctx.key()), 1);
        assert_record_kinds(&ctx.records(), &[OutputKind::ConsoleOutput]);
    }

    #[test]
    fn test_registration_failure_degrades_to_console_only() {
        let (_dir, fx) = fixture();
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();

        let handle = fx.monitor.last_handle().unwrap();
        fx.monitor
            .fail_registration(&handle, CaptureError::monitor(ctx.output_dir(), "watch limit"));

        assert_eq!(fx.device.off_count(), 1);
        assert_eq!(ctx.phase(), CapturePhase::Armed);
        assert!(!ctx.is_completed());

        fx.console().emit_prompt("> ");
        assert_eq!(fx.recorder.completion_count(ctx.key()), 1);
    }

    #[test]
    fn test_initial_listing_and_add_event_deliver_once() {
        let (_dir, fx) = fixture();
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();

        // written between arming and watcher activation
        let plot = fx.device.draw(1).unwrap();
        let handle = fx.activate_graphics().unwrap();
        fx.monitor.emit_changes(
            &handle,
            &[FileChangeEvent::new(FileChangeKind::Added, FileInfo::file(&plot))],
        );
        fx.console().emit_prompt("> ");

        assert_record_kinds(&ctx.records(), &[OutputKind::Plot]);
        assert!(ctx.output_dir().join("000000.png").exists());
        assert_eq!(fx.recorder.outputs().len(), 1);
    }

    #[test]
    fn test_teardown_rescan_finds_flushed_plot_once() {
        let (_dir, fx) = fixture_with(RecordingDevice::new().with_flush_on_off(2));
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();
        fx.activate_graphics().unwrap();

        fx.console().emit_prompt("> ");

        assert_record_kinds(&ctx.records(), &[OutputKind::Plot]);
        assert!(ctx.output_dir().join("000000.png").exists());
        let completions = fx.recorder.completions();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].outputs, 1);
    }

    #[test]
    fn test_graphics_completes_before_prompt() {
        let (_dir, fx) = fixture();
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();
        fx.activate_graphics().unwrap();

        ctx.graphics_session().unwrap().stop();

        assert!(!ctx.graphics_connected());
        assert_eq!(ctx.phase(), CapturePhase::Armed);
        assert_eq!(fx.recorder.completion_count(ctx.key()), 0);

        fx.console().emit_output(ConsoleStream::Normal, "after plots");
        fx.console().emit_prompt("> ");
        fx.console().emit_prompt("> ");

        assert_eq!(fx.recorder.completion_count(ctx.key()), 1);
        assert_record_kinds(&ctx.records(), &[OutputKind::ConsoleOutput]);
    }

    #[test]
    fn test_draining_until_graphics_finish() {
        let (_dir, fx) = fixture();
        fx.monitor.set_deferred_unregister(true);
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();
        let handle = fx.activate_graphics().unwrap();

        fx.console().emit_prompt("> ");

        assert_eq!(ctx.phase(), CapturePhase::Draining);
        assert!(fx.monitor.unregister_requested(&handle));
        assert!(!ctx.is_completed());

        // a plot that lands while draining still belongs to the chunk
        let plot = fx.device.draw(1).unwrap();
        fx.monitor.emit_changes(
            &handle,
            &[FileChangeEvent::new(FileChangeKind::Added, FileInfo::file(&plot))],
        );
        fx.monitor.finish_unregister(&handle);

        assert_eq!(ctx.phase(), CapturePhase::Completed);
        assert_record_kinds(&ctx.records(), &[OutputKind::Plot]);
        assert_eq!(fx.recorder.completion_count(ctx.key()), 1);
    }

    #[test]
    fn test_shared_assets_merged_once_across_chunks() {
        let (_dir, fx) = fixture();

        for chunk in ["c1", "c2"] {
            let ctx = fx.context("doc", chunk).unwrap();
            ctx.connect().unwrap();
            let html = write_widget(&ctx.output_dir(), b"lib();");
            fx.notebook().html_output.emit(&html);
            fx.console().emit_prompt("> ");

            assert!(ctx.output_dir().join("000000.html").exists());
            assert!(!ctx.output_dir().join("lib").exists());
            assert!(!html.exists());
        }

        let shared = fx.runtime.layout().shared_lib_dir("doc");
        let entries: Vec<_> = std::fs::read_dir(&shared)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("shared.js")]);
        assert_eq!(std::fs::read(shared.join("shared.js")).unwrap(), b"lib();");
    }

    #[test]
    fn test_fragment_is_claimed_only_by_its_own_chunk() {
        let (_dir, fx) = fixture();
        let a = fx.context("d", "a").unwrap();
        let b = fx.context("d", "b").unwrap();
        a.connect().unwrap();
        b.connect().unwrap();

        let html = write_widget(&a.output_dir(), b"a();");
        fx.notebook().html_output.emit(&html);

        assert_record_kinds(&a.records(), &[OutputKind::RichContent]);
        assert!(b.records().is_empty());
        assert!(a.output_dir().join("000000.html").exists());

        fx.console().emit_prompt("> ");
        let manifest = ChunkManifest::read(fx.runtime.layout().manifest(b.key())).unwrap();
        assert!(manifest.outputs.is_empty());
    }

    #[test]
    fn test_setup_failure_attaches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("not-a-dir");
        std::fs::write(&root, b"file").unwrap();
        let fx = CaptureFixture::new(&root).unwrap();
        let ctx = fx.context("d", "c").unwrap();

        let err = ctx.connect().unwrap_err();

        assert!(matches!(err, CaptureError::Setup { .. }));
        assert_eq!(fx.console().prompt.subscriber_count(), 0);
        assert_eq!(fx.console().output.subscriber_count(), 0);
        assert_eq!(fx.console().input.subscriber_count(), 0);
        assert_eq!(fx.notebook().html_output.subscriber_count(), 0);
        assert_eq!(fx.monitor.registration_count(), 0);
        assert_eq!(ctx.phase(), CapturePhase::Idle);
    }

    #[test]
    fn test_one_armed_context_per_chunk() {
        let (_dir, fx) = fixture();
        let first = fx.context("d", "c").unwrap();
        first.connect().unwrap();

        assert!(matches!(first.connect(), Err(CaptureError::InvalidTransition(_))));
        let second = fx.context("d", "c").unwrap();
        assert!(matches!(second.connect(), Err(CaptureError::AlreadyArmed(_))));

        fx.console().emit_prompt("> ");
        let third = fx.context("d", "c").unwrap();
        assert!(third.connect().is_ok());
    }

    #[test]
    fn test_dropping_unfinished_context_releases_chunk() {
        let (_dir, fx) = fixture();
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();
        drop(ctx);

        assert_eq!(fx.console().prompt.subscriber_count(), 0);
        assert!(fx.recorder.completions().is_empty());

        let again = fx.context("d", "c").unwrap();
        assert!(again.connect().is_ok());
    }

    #[test]
    fn test_empty_text_is_ignored() {
        let (_dir, fx) = fixture();
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();

        fx.console().emit_output(ConsoleStream::Normal, "");
        fx.console().emit_input("");

        assert!(ctx.records().is_empty());
        assert!(fx.recorder.console_outputs().is_empty());
    }

    #[test]
    fn test_console_input_is_recorded() {
        let (_dir, fx) = fixture();
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();

        fx.console().emit_input("x <- 1");

        let console = fx.recorder.console_outputs();
        assert_eq!(console.len(), 1);
        assert_eq!(console[0].kind, OutputKind::ConsoleInput);
        assert_eq!(console[0].text, "x <- 1");
    }

    #[test]
    fn test_persistence_failure_still_notifies() {
        let (_dir, fx) = fixture();
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();
        std::fs::remove_dir_all(ctx.output_dir()).unwrap();

        fx.console().emit_output(ConsoleStream::Normal, "lost on disk");

        assert_eq!(fx.recorder.console_outputs().len(), 1);
        assert_eq!(ctx.records().len(), 1);
    }

    #[test]
    fn test_relocation_failure_consumes_ordinal() {
        let (_dir, fx) = fixture();
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();

        fx.notebook().html_output.emit(&ctx.output_dir().join("vanished.html"));
        fx.console().emit_output(ConsoleStream::Normal, "next");

        assert!(fx.recorder.outputs().is_empty());
        assert_eq!(fx.recorder.console_outputs()[0].ordinal, 1);
        assert_ordinals_contiguous(&ctx.records());
    }

    #[test]
    fn test_completion_reports_session_and_writes_manifest() {
        let (_dir, fx) = fixture();
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();
        fx.console().emit_output(ConsoleStream::Normal, "one");
        fx.console().emit_prompt("> ");

        let completion = &fx.recorder.completions()[0];
        assert_eq!(completion.key, ChunkKey::new("d", "c"));
        assert_eq!(completion.session_context_id, TEST_SESSION_CONTEXT_ID);
        assert_eq!(fx.sink.count("chunk.connected"), 1);
        assert_eq!(fx.sink.count("chunk.completed"), 1);

        let manifest = ChunkManifest::read(fx.runtime.layout().manifest(ctx.key())).unwrap();
        assert_eq!(manifest.outputs.len(), 1);
        assert_eq!(manifest.outputs[0].kind, OutputKind::ConsoleOutput);
    }

    #[test]
    fn test_output_after_completion_is_ignored() {
        let (_dir, fx) = fixture();
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();
        fx.console().emit_prompt("> ");

        ctx.on_console_text(OutputKind::ConsoleOutput, "late", false);
        fx.console().emit_output(ConsoleStream::Normal, "later");

        assert!(ctx.records().is_empty());
        assert!(fx.recorder.console_outputs().is_empty());
    }

    #[test]
    fn test_explicit_disconnect_recovers_and_is_idempotent() {
        let (_dir, fx) = fixture();
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();

        ctx.disconnect();
        ctx.disconnect();

        assert!(ctx.is_completed());
        assert_eq!(fx.recorder.completion_count(ctx.key()), 1);
        assert_eq!(fx.console().output.subscriber_count(), 0);
    }

    #[test]
    fn test_concurrent_console_text_gets_unique_ordinals() {
        let (_dir, fx) = fixture();
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();

        let threads: Vec<_> = (0..4)
            .map(|t| {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        ctx.on_console_text(OutputKind::ConsoleOutput, &format!("{t}:{i}"), false);
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let ordinals: HashSet<u64> = fx
            .recorder
            .console_outputs()
            .iter()
            .map(|out| out.ordinal)
            .collect();
        assert_eq!(ordinals, (0..100).collect::<HashSet<u64>>());
        assert_ordinals_contiguous(&ctx.records());
    }

    #[tokio::test]
    async fn test_wait_completed_resolves_on_prompt() {
        let (_dir, fx) = fixture();
        let ctx = fx.context("d", "c").unwrap();
        ctx.connect().unwrap();

        let waiter = {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move { ctx.wait_completed().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        fx.console().emit_prompt("> ");

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("completion wait timed out")
            .unwrap();
        // resolves immediately once completed
        ctx.wait_completed().await;
    }
}
