//! Batch orchestration over a set of input files

use super::operation::{Operation, ProcessingMode};
use super::runner::{JobRequest, JobRunner};
use crate::cancel::CancellationController;
use crate::error::{Error, Result};
use crate::types::{BatchOutcome, Event, InputFile, OutputFile, ProcessingProgress, SourceId};
use crate::utils::file_stem;
use tokio::sync::broadcast;

/// Runs an [`Operation`] over a batch of inputs
///
/// Per-file mode runs one job per input strictly in order and isolates
/// failures; combined mode runs a single job for all inputs. Zero-byte inputs
/// are reported as failed and never submitted.
#[derive(Clone)]
pub struct BatchOrchestrator {
    runner: JobRunner,
    event_tx: broadcast::Sender<Event>,
}

impl BatchOrchestrator {
    /// Create an orchestrator around `runner`
    pub fn new(runner: JobRunner, event_tx: broadcast::Sender<Event>) -> Self {
        Self { runner, event_tx }
    }

    fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Run `operation` over `files`
    ///
    /// Returns the partial outcome when at least one input succeeded.
    pub async fn run(
        &self,
        operation: &Operation,
        files: &[InputFile],
        cancel: &CancellationController,
    ) -> Result<BatchOutcome> {
        if files.is_empty() {
            return Err(Error::InvalidInput("No files selected".to_string()));
        }

        let mut outcome = BatchOutcome::default();
        let mut valid = Vec::with_capacity(files.len());
        for file in files {
            if file.size() == 0 {
                tracing::warn!(file = %file.name, "skipping empty input file");
                self.emit(Event::FileFailed {
                    name: file.name.clone(),
                    error: "File is empty".to_string(),
                });
                outcome.failed_files.push(file.name.clone());
            } else {
                valid.push(file.clone());
            }
        }

        if valid.is_empty() {
            return Err(Error::InvalidInput("No valid files to process".to_string()));
        }

        let total = files.len();
        self.emit(Event::BatchStarted { total: valid.len() });
        tracing::info!(
            operation = %operation.name,
            mode = ?operation.mode,
            files = valid.len(),
            skipped = outcome.failed_files.len(),
            "starting batch"
        );

        let result = match operation.mode {
            ProcessingMode::PerFile => self.run_per_file(operation, &valid, cancel, &mut outcome).await,
            ProcessingMode::Combined => self.run_combined(operation, &valid, cancel, &mut outcome).await,
        };

        if let Err(e) = result {
            if e.is_cancelled() {
                tracing::info!(operation = %operation.name, "batch cancelled");
                self.emit(Event::Cancelled);
            }
            return Err(e);
        }

        let succeeded = outcome.success_source_ids.len();
        if !outcome.failed_files.is_empty() {
            self.emit(Event::Status {
                message: format!(
                    "Processed {}/{} files. Failed: {}",
                    succeeded,
                    total,
                    outcome.failed_files.join(", ")
                ),
            });
        }
        self.emit(Event::BatchFinished {
            succeeded,
            failed: outcome.failed_files.len(),
        });
        tracing::info!(
            operation = %operation.name,
            succeeded,
            failed = outcome.failed_files.len(),
            outputs = outcome.output_files.len(),
            "batch finished"
        );

        Ok(outcome)
    }

    async fn run_per_file(
        &self,
        operation: &Operation,
        files: &[InputFile],
        cancel: &CancellationController,
        outcome: &mut BatchOutcome,
    ) -> Result<()> {
        for (index, file) in files.iter().enumerate() {
            cancel.check()?;

            self.emit(Event::Progress(ProcessingProgress {
                current: index + 1,
                total: files.len(),
                current_file_name: Some(file.name.clone()),
            }));

            let inputs = std::slice::from_ref(file);
            let result = self
                .runner
                .run(JobRequest::for_operation(operation, inputs), cancel)
                .await
                .and_then(|outputs| {
                    if outputs.is_empty() {
                        Err(Error::EmptyOutput(operation.name.clone()))
                    } else {
                        Ok(outputs)
                    }
                });

            match result {
                Ok(outputs) => {
                    outcome.output_files.extend(outputs);
                    outcome.success_source_ids.push(file.id.clone());
                }
                Err(e) if e.is_cancelled() || cancel.is_cancelled() => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        file = %file.name,
                        index = index + 1,
                        total = files.len(),
                        error = %e,
                        "file failed, continuing with batch"
                    );
                    self.emit(Event::FileFailed {
                        name: file.name.clone(),
                        error: e.user_message(),
                    });
                    outcome.failed_files.push(file.name.clone());
                }
            }
        }

        if outcome.success_source_ids.is_empty() {
            return Err(Error::AllFilesFailed {
                failed: outcome.failed_files.clone(),
            });
        }
        Ok(())
    }

    async fn run_combined(
        &self,
        operation: &Operation,
        files: &[InputFile],
        cancel: &CancellationController,
        outcome: &mut BatchOutcome,
    ) -> Result<()> {
        let outputs = match self
            .runner
            .run(JobRequest::for_operation(operation, files), cancel)
            .await
        {
            Ok(outputs) => outputs,
            Err(_) if cancel.is_cancelled() => return Err(Error::Cancelled),
            Err(e) => return Err(e),
        };

        if outputs.is_empty() {
            return Err(Error::EmptyOutput(operation.name.clone()));
        }

        outcome.success_source_ids = if operation.consumes_all_inputs {
            files.iter().map(|f| f.id.clone()).collect()
        } else {
            success_sources(&outputs, files, &operation.naming.prefix)
        };
        outcome.output_files = outputs;
        Ok(())
    }
}

/// Map combined-mode outputs back to the inputs that produced them
///
/// Matches base names (with or without the output prefix); when nothing
/// matches, outputs are aligned with inputs by position.
fn success_sources(outputs: &[OutputFile], inputs: &[InputFile], prefix: &str) -> Vec<SourceId> {
    let matched: Vec<SourceId> = inputs
        .iter()
        .filter(|input| {
            let stem = file_stem(&input.name);
            outputs.iter().any(|output| {
                let out = file_stem(&output.name);
                out == stem || out.strip_prefix(prefix) == Some(stem)
            })
        })
        .map(|input| input.id.clone())
        .collect();

    if !matched.is_empty() {
        return matched;
    }

    inputs
        .iter()
        .take(outputs.len())
        .map(|input| input.id.clone())
        .collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::test_helpers::*;
    use crate::transport::RawResponse;
    use crate::types::JobState;
    use std::sync::Arc;
    use std::time::Duration;

    fn orchestrator(transport: Arc<MockTransport>) -> (BatchOrchestrator, broadcast::Receiver<Event>) {
        let mut config = Config::default();
        config.polling.interval = Duration::from_millis(5);
        config.retry.max_attempts = 0;
        let (tx, rx) = broadcast::channel(256);
        let runner = JobRunner::new(transport, Arc::new(config), tx.clone());
        (BatchOrchestrator::new(runner, tx), rx)
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn names(n: usize) -> Vec<InputFile> {
        (1..=n)
            .map(|i| input(&i.to_string(), &format!("f{i}.pdf")))
            .collect()
    }

    #[tokio::test]
    async fn partial_failure_keeps_successes_in_order() {
        let transport = Arc::new(MockTransport::new());
        transport
            .push_submit(Ok(pdf(b"%PDF-1", None)))
            .push_submit(Err(http_error(500, "boom")))
            .push_submit(Ok(pdf(b"%PDF-3", None)))
            .push_submit(Err(http_error(500, "boom")))
            .push_submit(Ok(pdf(b"%PDF-5", None)));
        let (orchestrator, mut rx) = orchestrator(transport.clone());

        let op = Operation::new("compress", "/compress").with_prefix("c_");
        let outcome = orchestrator
            .run(&op, &names(5), &CancellationController::new())
            .await
            .unwrap();

        let out_names: Vec<_> = outcome.output_files.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(out_names, vec!["c_f1.pdf", "c_f3.pdf", "c_f5.pdf"]);
        assert_eq!(outcome.failed_files, vec!["f2.pdf", "f4.pdf"]);
        assert_eq!(
            outcome.success_source_ids,
            vec![SourceId::from("1"), SourceId::from("3"), SourceId::from("5")]
        );

        let events = drain(&mut rx);
        let progress: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::Progress(p) => Some((p.current, p.total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
        assert!(events.contains(&Event::Status {
            message: "Processed 3/5 files. Failed: f2.pdf, f4.pdf".into()
        }));
        assert_eq!(
            events.last(),
            Some(&Event::BatchFinished {
                succeeded: 3,
                failed: 2
            })
        );
    }

    #[tokio::test]
    async fn all_failures_raise_all_files_failed() {
        let transport = Arc::new(MockTransport::new());
        for _ in 0..3 {
            transport.push_submit(Err(http_error(500, "boom")));
        }
        let (orchestrator, _rx) = orchestrator(transport);

        let op = Operation::new("compress", "/compress");
        let err = orchestrator
            .run(&op, &names(3), &CancellationController::new())
            .await
            .unwrap_err();
        match err {
            Error::AllFilesFailed { failed } => {
                assert_eq!(failed, vec!["f1.pdf", "f2.pdf", "f3.pdf"])
            }
            other => panic!("expected AllFilesFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_output_counts_as_failure() {
        let transport = Arc::new(MockTransport::new());
        transport
            .push_submit(Ok(RawResponse::new("application/pdf", Vec::new())))
            .push_submit(Ok(pdf(b"%PDF-2", None)));
        let (orchestrator, mut rx) = orchestrator(transport);

        let op = Operation::new("compress", "/compress");
        let outcome = orchestrator
            .run(&op, &names(2), &CancellationController::new())
            .await
            .unwrap();
        assert_eq!(outcome.failed_files, vec!["f1.pdf"]);
        assert_eq!(outcome.output_files.len(), 1);

        let failed = drain(&mut rx).into_iter().find_map(|e| match e {
            Event::FileFailed { name, error } => Some((name, error)),
            _ => None,
        });
        let (name, error) = failed.unwrap();
        assert_eq!(name, "f1.pdf");
        assert!(error.contains("compress"));
    }

    #[tokio::test]
    async fn zero_byte_inputs_are_skipped_and_reported() {
        let transport = Arc::new(MockTransport::new());
        transport.push_submit(Ok(pdf(b"%PDF-ok", None)));
        let (orchestrator, mut rx) = orchestrator(transport.clone());

        let files = vec![
            InputFile::new("e", "empty.pdf", "application/pdf", Vec::new()),
            input("1", "a.pdf"),
        ];
        let op = Operation::new("compress", "/compress");
        let outcome = orchestrator
            .run(&op, &files, &CancellationController::new())
            .await
            .unwrap();

        assert_eq!(outcome.failed_files, vec!["empty.pdf"]);
        assert_eq!(outcome.success_source_ids, vec![SourceId::from("1")]);
        assert_eq!(transport.calls().len(), 1);

        let events = drain(&mut rx);
        assert!(matches!(events[0], Event::FileFailed { .. }));
        assert_eq!(events[1], Event::BatchStarted { total: 1 });
    }

    #[tokio::test]
    async fn no_usable_inputs_is_invalid_input() {
        let transport = Arc::new(MockTransport::new());
        let (orchestrator, _rx) = orchestrator(transport.clone());
        let op = Operation::new("compress", "/compress");

        let err = orchestrator
            .run(&op, &[], &CancellationController::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No files selected");

        let empty = [InputFile::new("e", "e.pdf", "application/pdf", Vec::new())];
        let err = orchestrator
            .run(&op, &empty, &CancellationController::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref m) if m == "No valid files to process"));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn cancellation_mid_batch_stops_remaining_files() {
        let transport = Arc::new(MockTransport::new());
        transport
            .push_submit(Ok(async_accepted("j1")))
            .repeat_status(processing("j1", Some(10.0)));
        let (orchestrator, mut rx) = orchestrator(transport.clone());

        let cancel = CancellationController::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let op = Operation::new("ocr", "/ocr");
        let err = orchestrator.run(&op, &names(3), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());

        let submits = transport
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::Submit { .. }))
            .count();
        assert_eq!(submits, 1, "no file starts after cancellation");
        assert_eq!(transport.cancel_calls(), 1);

        let events = drain(&mut rx);
        assert_eq!(events.last(), Some(&Event::Cancelled));
        assert!(!events.iter().any(|e| matches!(e, Event::FileFailed { .. })));
        assert!(!events.iter().any(|e| matches!(
            e,
            Event::JobUpdate(u) if u.status == JobState::Completed
        )));
    }

    #[tokio::test]
    async fn combined_mode_submits_once_and_maps_sources_by_name() {
        let transport = Arc::new(MockTransport::new());
        transport.push_submit(Ok(RawResponse::new(
            "application/zip",
            zip_bytes(&[("a.png", &b"1"[..]), ("c.png", &b"3"[..])]),
        )));
        let (orchestrator, mut rx) = orchestrator(transport.clone());

        let op = Operation::new("to-image", "/convert")
            .combined()
            .with_handler(crate::pipeline::response::ZipExpander);
        let files = [input("1", "a.pdf"), input("2", "b.pdf"), input("3", "c.pdf")];
        let outcome = orchestrator
            .run(&op, &files, &CancellationController::new())
            .await
            .unwrap();

        assert_eq!(outcome.output_files.len(), 2);
        assert_eq!(
            outcome.success_source_ids,
            vec![SourceId::from("1"), SourceId::from("3")]
        );
        assert_eq!(
            transport.calls(),
            vec![Call::Submit {
                endpoint: "/convert?async=true".into(),
                files: vec!["a.pdf".into(), "b.pdf".into(), "c.pdf".into()],
            }]
        );
        assert!(
            !drain(&mut rx)
                .iter()
                .any(|e| matches!(e, Event::Progress(_)))
        );
    }

    #[tokio::test]
    async fn combined_mode_consuming_all_inputs() {
        let transport = Arc::new(MockTransport::new());
        transport.push_submit(Ok(pdf(b"%PDF-merged", Some("merged.pdf"))));
        let (orchestrator, _rx) = orchestrator(transport);

        let op = Operation::new("merge", "/merge").combined().consumes_all_inputs();
        let outcome = orchestrator
            .run(&op, &names(3), &CancellationController::new())
            .await
            .unwrap();
        assert_eq!(outcome.output_files[0].name, "merged.pdf");
        assert_eq!(outcome.success_source_ids.len(), 3);
    }

    #[tokio::test]
    async fn combined_mode_empty_output_is_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_submit(Ok(RawResponse::new("application/pdf", Vec::new())));
        let (orchestrator, _rx) = orchestrator(transport);

        let op = Operation::new("merge", "/merge").combined();
        let err = orchestrator
            .run(&op, &names(2), &CancellationController::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyOutput(ref name) if name == "merge"));
    }

    #[test]
    fn success_sources_fall_back_to_position() {
        let inputs = names(3);
        let outputs = [
            OutputFile::new("x.pdf", "application/pdf", vec![1]),
            OutputFile::new("y.pdf", "application/pdf", vec![2]),
        ];
        assert_eq!(
            success_sources(&outputs, &inputs, ""),
            vec![SourceId::from("1"), SourceId::from("2")]
        );

        let prefixed = [OutputFile::new("ocr_f2.pdf", "application/pdf", vec![1])];
        assert_eq!(
            success_sources(&prefixed, &inputs, "ocr_"),
            vec![SourceId::from("2")]
        );
    }
}
