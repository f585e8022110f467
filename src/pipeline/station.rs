//! Station abstraction: one thread per stage, connected by channels.

use crate::pipeline::error::{ErrorReporter, StationError};
use crossbeam_channel::{Receiver, Sender};
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A processing stage of the live pipeline.
///
/// A station consumes items from its input channel until that channel is
/// closed, then runs [`shutdown`](Station::shutdown).
pub trait Station: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Processes one item.
    ///
    /// `Ok(None)` consumes the item without producing output. A recoverable
    /// error is reported and the station continues; a fatal one stops it.
    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError>;

    fn name(&self) -> &'static str;

    /// Called once after the input channel closes or a fatal error.
    fn shutdown(&mut self) {}
}

/// Owns the thread running one station.
pub struct StationRunner<S: Station> {
    handle: Option<JoinHandle<()>>,
    station_name: &'static str,
    _phantom: PhantomData<S>,
}

impl<S: Station> StationRunner<S> {
    pub fn spawn(
        mut station: S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) -> std::io::Result<Self> {
        let station_name = station.name();
        let handle = thread::Builder::new()
            .name(format!("fragcast-{station_name}"))
            .spawn(move || {
                Self::run(&mut station, &input_rx, &output_tx, error_reporter.as_ref());
                station.shutdown();
            })?;

        Ok(Self {
            handle: Some(handle),
            station_name,
            _phantom: PhantomData,
        })
    }

    fn run(
        station: &mut S,
        input_rx: &Receiver<S::Input>,
        output_tx: &Sender<S::Output>,
        error_reporter: &dyn ErrorReporter,
    ) {
        let name = station.name();
        for input in input_rx.iter() {
            match station.process(input) {
                Ok(Some(output)) => {
                    if output_tx.send(output).is_err() {
                        tracing::debug!(station = name, "Downstream closed");
                        return;
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    error_reporter.report(name, &error);
                    if error.is_fatal() {
                        return;
                    }
                }
            }
        }
    }

    /// Waits for the station thread to finish.
    pub fn join(mut self) -> Result<(), String> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| format!("Station '{}' thread panicked", self.station_name)),
            None => Ok(()),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    pub fn name(&self) -> &'static str {
        self.station_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct UppercaseStation {
        shutdown_called: Arc<AtomicBool>,
    }

    impl Station for UppercaseStation {
        type Input = String;
        type Output = String;

        fn process(&mut self, input: String) -> Result<Option<String>, StationError> {
            Ok(Some(input.to_uppercase()))
        }

        fn name(&self) -> &'static str {
            "uppercase"
        }

        fn shutdown(&mut self) {
            self.shutdown_called.store(true, Ordering::SeqCst);
        }
    }

    /// Drops empty strings, fails recoverably on "bad", fatally on "stop".
    struct PickyStation;

    impl Station for PickyStation {
        type Input = String;
        type Output = String;

        fn process(&mut self, input: String) -> Result<Option<String>, StationError> {
            match input.as_str() {
                "" => Ok(None),
                "bad" => Err(StationError::Recoverable("bad input".to_string())),
                "stop" => Err(StationError::Fatal("stop requested".to_string())),
                _ => Ok(Some(input)),
            }
        }

        fn name(&self) -> &'static str {
            "picky"
        }
    }

    #[derive(Default)]
    struct CollectingReporter {
        errors: Mutex<Vec<(String, StationError)>>,
    }

    impl ErrorReporter for CollectingReporter {
        fn report(&self, stage: &str, error: &StationError) {
            self.errors
                .lock()
                .unwrap()
                .push((stage.to_string(), error.clone()));
        }
    }

    #[test]
    fn test_runner_processes_and_shuts_down() {
        let (input_tx, input_rx) = bounded(8);
        let (output_tx, output_rx) = bounded(8);
        let flag = Arc::new(AtomicBool::new(false));
        let runner = StationRunner::spawn(
            UppercaseStation {
                shutdown_called: flag.clone(),
            },
            input_rx,
            output_tx,
            Arc::new(CollectingReporter::default()),
        )
        .unwrap();
        assert_eq!(runner.name(), "uppercase");

        input_tx.send("gg".to_string()).unwrap();
        input_tx.send("ez".to_string()).unwrap();
        drop(input_tx);

        let outputs: Vec<String> = output_rx.iter().collect();
        assert_eq!(outputs, vec!["GG", "EZ"]);
        runner.join().unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_runner_filters_and_recovers() {
        let (input_tx, input_rx) = bounded(8);
        let (output_tx, output_rx) = bounded(8);
        let reporter = Arc::new(CollectingReporter::default());
        let runner =
            StationRunner::spawn(PickyStation, input_rx, output_tx, reporter.clone()).unwrap();

        for item in ["one", "", "bad", "two"] {
            input_tx.send(item.to_string()).unwrap();
        }
        drop(input_tx);

        let outputs: Vec<String> = output_rx.iter().collect();
        assert_eq!(outputs, vec!["one", "two"]);
        runner.join().unwrap();

        let errors = reporter.errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "picky");
    }

    #[test]
    fn test_runner_stops_on_fatal() {
        let (input_tx, input_rx) = bounded(8);
        let (output_tx, output_rx) = bounded(8);
        let reporter = Arc::new(CollectingReporter::default());
        let runner =
            StationRunner::spawn(PickyStation, input_rx, output_tx, reporter.clone()).unwrap();

        input_tx.send("stop".to_string()).unwrap();
        runner.join().unwrap();
        let _ = input_tx.send("after".to_string());

        assert!(output_rx.try_recv().is_err());
        assert!(reporter.errors.lock().unwrap()[0].1.is_fatal());
    }
}
