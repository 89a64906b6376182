//! The solver session: process lifecycle, decode loop, and result delivery.
//!
//! A [`SolverSession`] owns exactly one solver subprocess and its two pipes.
//! The stdout decode loop is pull-based: every call to [`SolverSession::next`]
//! drives the pipeline until one more [`SolveResult`] is available, the
//! stream ends, or the session deadline expires. A spawned task drains
//! stderr for the whole session lifetime so a chatty solver can never
//! deadlock against a full pipe buffer.

use std::collections::VecDeque;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::config::{Method, Protocol, SessionConfig, SolutionMultiplicity};
use crate::error::{classify_stderr, SolveError};
use crate::feed::{ByteFeeder, Chunk};
use crate::protocol::json::JsonDecoder;
use crate::protocol::legacy::{LegacyDecoder, SEPARATOR};
use crate::protocol::Message;
use crate::solution::{Solution, SolutionAssembler, Value};
use crate::stats::{Statistics, StatisticsAccumulator};
use crate::status::{Status, StatusResolver};

/// Extra time granted past the caller deadline, so the solver's own
/// time-limit flag gets the first chance to stop the search cleanly.
const DEADLINE_GRACE: std::time::Duration = std::time::Duration::from_secs(1);

/// How long a terminated solver gets to exit before the kill escalates.
#[cfg(unix)]
const TERMINATE_GRACE: std::time::Duration = std::time::Duration::from_secs(1);

/// One incremental result of a solving session.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Status resolved at the time this result was produced.
    pub status: Status,
    /// The solution triggering this result; `None` for the terminal
    /// "no new solution" result.
    pub solution: Option<Solution>,
    /// Statistics reported since the previous result.
    pub statistics: Statistics,
}

/// Solutions retained by the aggregate outcome.
#[derive(Debug, Clone)]
pub enum SolutionSet {
    /// No solution was found.
    None,
    /// The single (last) solution of a plain solve.
    Single(Solution),
    /// Every solution of a multi-solution session, in discovery order.
    Multiple(Vec<Solution>),
}

impl SolutionSet {
    pub fn len(&self) -> usize {
        match self {
            SolutionSet::None => 0,
            SolutionSet::Single(_) => 1,
            SolutionSet::Multiple(solutions) => solutions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The last (best) solution, when any exists.
    pub fn last(&self) -> Option<&Solution> {
        self.as_slice().last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Solution> {
        self.as_slice().iter()
    }

    fn as_slice(&self) -> &[Solution] {
        match self {
            SolutionSet::None => &[],
            SolutionSet::Single(solution) => std::slice::from_ref(solution),
            SolutionSet::Multiple(solutions) => solutions,
        }
    }
}

/// Aggregate outcome of a fully drained session.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Final resolved status.
    pub status: Status,
    /// Retained solution(s), per the session's multiplicity.
    pub solution: SolutionSet,
    /// All statistics reported over the session.
    pub statistics: Statistics,
}

impl SolveOutcome {
    /// Objective of the best solution, for optimization problems.
    pub fn objective(&self) -> Option<&Value> {
        self.solution.last()?.objective()
    }
}

enum ProtocolDecoder {
    Legacy(LegacyDecoder),
    Json(JsonDecoder),
}

/// Decode pipeline over any byte stream.
///
/// Couples the feeder, the protocol decoder, and the three consumers
/// (assembler, status resolver, statistics accumulator). The session runs
/// it over the live pipe; after an abnormal termination the identical
/// pipeline decodes whatever bytes were salvaged.
pub struct DecodePipeline<R> {
    feeder: ByteFeeder<R>,
    decoder: ProtocolDecoder,
    assembler: SolutionAssembler,
    resolver: StatusResolver,
    stats: StatisticsAccumulator,
    pending: VecDeque<SolveResult>,
    warnings: Vec<String>,
    last_status: Status,
    fault: Option<SolveError>,
    drained: bool,
}

impl<R: AsyncRead + Unpin> DecodePipeline<R> {
    pub fn new(
        reader: R,
        protocol: Protocol,
        method: Method,
        field_renames: Vec<(String, String)>,
        read_buffer_limit: usize,
    ) -> Self {
        let decoder = match protocol {
            Protocol::Legacy => ProtocolDecoder::Legacy(LegacyDecoder::new(method)),
            Protocol::JsonStream => ProtocolDecoder::Json(JsonDecoder::new()),
        };
        Self {
            feeder: ByteFeeder::new(reader, read_buffer_limit),
            decoder,
            assembler: SolutionAssembler::new(field_renames),
            resolver: StatusResolver::new(),
            stats: StatisticsAccumulator::new(),
            pending: VecDeque::new(),
            warnings: Vec::new(),
            last_status: Status::Unknown,
            fault: None,
            drained: false,
        }
    }

    /// Produces the next result, suspending on stream reads as needed.
    ///
    /// After a solver-reported error, remaining output is drained without
    /// decoding; the final salvage result (if any) is still yielded before
    /// the error surfaces.
    pub async fn next_partial(&mut self) -> Result<Option<SolveResult>, SolveError> {
        loop {
            if let Some(result) = self.pending.pop_front() {
                return Ok(Some(result));
            }
            if self.drained {
                if let Some(fault) = self.fault.take() {
                    return Err(fault);
                }
                return Ok(None);
            }

            let chunk = match &self.decoder {
                ProtocolDecoder::Legacy(_) => self.feeder.read_until(SEPARATOR).await?,
                ProtocolDecoder::Json(_) => self.feeder.read_line().await?,
            };
            match chunk {
                None => {
                    self.drained = true;
                    self.emit_final();
                }
                Some(chunk) => {
                    if self.fault.is_some() {
                        continue;
                    }
                    match self.decode_chunk(&chunk) {
                        Ok(messages) => self.handle_messages(messages),
                        Err(err) => self.fault = Some(err),
                    }
                }
            }
        }
    }

    fn decode_chunk(&self, chunk: &Chunk) -> Result<Vec<Message>, SolveError> {
        match &self.decoder {
            ProtocolDecoder::Legacy(decoder) => {
                decoder.decode_block(&chunk.bytes, chunk.terminated)
            }
            ProtocolDecoder::Json(decoder) => decoder.decode_line(&chunk.bytes),
        }
    }

    fn handle_messages(&mut self, messages: Vec<Message>) {
        for message in messages {
            match message {
                Message::StatisticsDelta { entries } => {
                    for (name, value) in &entries {
                        self.stats.observe(name, value);
                    }
                }
                Message::TimeMarker { milliseconds } => self.stats.observe_time(milliseconds),
                Message::Checker { text } => self.assembler.stage_checker(text),
                Message::StatusMarker { status } => self.resolver.observe_marker(status),
                Message::Warning { message } => {
                    warn!(warning = %message, "solver warning");
                    self.warnings.push(message);
                }
                Message::Error(err) => {
                    self.fault = Some(err);
                    break;
                }
                Message::Solution { fields } => {
                    self.resolver.observe_solution();
                    let solution = self.assembler.assemble(&fields);
                    let status = self.resolver.current();
                    self.pending.push_back(SolveResult {
                        status,
                        solution: Some(solution),
                        statistics: self.stats.take(),
                    });
                    self.last_status = status;
                }
            }
        }
    }

    /// Emits the terminal result: the final status (when it moved past the
    /// last yielded one) together with any statistics still pending.
    fn emit_final(&mut self) {
        let status = self.resolver.current();
        if status != self.last_status || self.stats.has_pending() {
            self.pending.push_back(SolveResult {
                status,
                solution: None,
                statistics: self.stats.take(),
            });
            self.last_status = status;
        }
    }

    /// Folds the process exit code into the resolved status.
    fn finalize_exit(&mut self, exit_code: i32) -> Status {
        self.resolver.finalize(exit_code)
    }

    /// Best-effort decode of everything still buffered. Used after the
    /// process was terminated; decode faults are dropped, salvaged results
    /// are kept.
    async fn salvage(&mut self) -> Vec<SolveResult> {
        let mut results = Vec::new();
        loop {
            match self.next_partial().await {
                Ok(Some(result)) => results.push(result),
                Ok(None) => break,
                Err(_) => break,
            }
        }
        results
    }

    /// Warnings reported by the solver so far.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

enum SessionState {
    Streaming,
    Salvaging,
    Finished,
}

/// One solving session against one solver subprocess.
pub struct SolverSession {
    child: Child,
    pipeline: DecodePipeline<ChildStdout>,
    stderr_task: Option<JoinHandle<Vec<u8>>>,
    stderr_bytes: Option<Vec<u8>>,
    deadline: Option<Instant>,
    multiplicity: SolutionMultiplicity,
    state: SessionState,
    salvaged: VecDeque<SolveResult>,
    pending_error: Option<SolveError>,
}

impl std::fmt::Debug for SolverSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverSession")
            .field("multiplicity", &self.multiplicity)
            .finish_non_exhaustive()
    }
}

impl SolverSession {
    /// Spawns the solver process and prepares the decode loop.
    ///
    /// Configuration problems (inconsistent multiplicity, unspawnable
    /// executable) surface before any output is read.
    pub fn spawn(config: SessionConfig) -> Result<SolverSession, SolveError> {
        validate(&config)?;

        let mut cmd = Command::new(&config.executable);
        cmd.args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &config.env_vars {
            cmd.env(key, value);
        }
        // The solver leads its own process group: terminal signals aimed at
        // the wrapper never reach it, and group-wide termination reaches the
        // solver's own subprocesses.
        #[cfg(unix)]
        cmd.process_group(0);

        debug!(
            executable = %config.executable.display(),
            args = ?config.args,
            protocol = ?config.protocol,
            "spawning solver process"
        );

        let mut child = cmd.spawn().map_err(|e| {
            SolveError::Configuration(format!(
                "failed to spawn solver '{}': {e}",
                config.executable.display()
            ))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SolveError::Configuration("solver stdout was not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SolveError::Configuration("solver stderr was not captured".into()))?;

        // Mandatory stderr drain: runs for the whole session so the solver
        // can never block on a full stderr pipe.
        let stderr_task = tokio::spawn(async move {
            let mut stderr = stderr;
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        let pipeline = DecodePipeline::new(
            stdout,
            config.protocol,
            config.method,
            config.field_renames.clone(),
            config.read_buffer_limit,
        );

        Ok(SolverSession {
            child,
            pipeline,
            stderr_task: Some(stderr_task),
            stderr_bytes: None,
            deadline: config.deadline.map(|d| Instant::now() + d + DEADLINE_GRACE),
            multiplicity: config.multiplicity,
            state: SessionState::Streaming,
            salvaged: VecDeque::new(),
            pending_error: None,
        })
    }

    /// Produces the next result of the session.
    ///
    /// Returns `Ok(None)` exactly once when the session finished cleanly,
    /// or the classified error exactly once when it did not. Results are
    /// yielded strictly in decode order.
    pub async fn next(&mut self) -> Result<Option<SolveResult>, SolveError> {
        loop {
            match self.state {
                SessionState::Finished => {
                    if let Some(err) = self.pending_error.take() {
                        return Err(err);
                    }
                    return Ok(None);
                }
                SessionState::Salvaging => {
                    if let Some(result) = self.salvaged.pop_front() {
                        return Ok(Some(result));
                    }
                    self.state = SessionState::Finished;
                }
                SessionState::Streaming => {
                    let step = match self.deadline {
                        Some(deadline) => {
                            match timeout_at(deadline, self.pipeline.next_partial()).await {
                                Ok(step) => step,
                                Err(_) => {
                                    self.abort(SolveError::Timeout).await;
                                    continue;
                                }
                            }
                        }
                        None => self.pipeline.next_partial().await,
                    };
                    match step {
                        Ok(Some(result)) => return Ok(Some(result)),
                        Ok(None) => return self.finish().await,
                        Err(err) => {
                            self.terminate_and_wait().await;
                            let _ = self.take_stderr().await;
                            self.state = SessionState::Finished;
                            return Err(err);
                        }
                    }
                }
            }
        }
    }

    /// Cancels the session: terminate, drain buffered output, and decode it
    /// through the same pipeline. Returns the results salvaged from the
    /// remainder; further calls to [`next`] report the session as finished.
    ///
    /// [`next`]: SolverSession::next
    pub async fn cancel(&mut self) -> Result<Vec<SolveResult>, SolveError> {
        if matches!(self.state, SessionState::Finished) {
            return Ok(Vec::new());
        }
        self.terminate_and_wait().await;
        let results = self.pipeline.salvage().await;
        let _ = self.take_stderr().await;
        self.state = SessionState::Finished;
        Ok(results)
    }

    /// Drains the session and folds every result into one aggregate
    /// outcome, honoring the configured solution multiplicity.
    pub async fn collect(&mut self) -> Result<SolveOutcome, SolveError> {
        let collect_all = self.multiplicity.collects_all();
        let mut status = Status::Unknown;
        let mut statistics = Statistics::new();
        let mut solutions: Vec<Solution> = Vec::new();

        while let Some(result) = self.next().await? {
            status = result.status;
            statistics.extend(&result.statistics);
            if let Some(solution) = result.solution {
                if !collect_all {
                    solutions.clear();
                }
                solutions.push(solution);
            }
        }

        let solution = if collect_all {
            if solutions.is_empty() {
                SolutionSet::None
            } else {
                SolutionSet::Multiple(solutions)
            }
        } else {
            match solutions.pop() {
                Some(solution) => SolutionSet::Single(solution),
                None => SolutionSet::None,
            }
        };

        Ok(SolveOutcome {
            status,
            solution,
            statistics,
        })
    }

    /// Converts the session into a stream of results.
    pub fn into_stream(
        mut self,
    ) -> impl futures::Stream<Item = Result<SolveResult, SolveError>> {
        async_stream::try_stream! {
            while let Some(result) = self.next().await? {
                yield result;
            }
        }
    }

    /// Warnings reported by the solver so far.
    pub fn warnings(&self) -> &[String] {
        self.pipeline.warnings()
    }

    /// The drained stderr output. Available once the session has finished.
    pub fn stderr_output(&self) -> Option<&[u8]> {
        self.stderr_bytes.as_deref()
    }

    /// Clean end of stream: reap the process and classify a failure exit.
    async fn finish(&mut self) -> Result<Option<SolveResult>, SolveError> {
        let exit = self.child.wait().await?;
        let code = exit.code().unwrap_or(-1);
        let stderr = self.take_stderr().await;
        let status = self.pipeline.finalize_exit(code);
        self.state = SessionState::Finished;

        debug!(exit_code = code, %status, "solver process finished");

        if code != 0 || status == Status::Error {
            return Err(classify_stderr(&stderr));
        }
        Ok(None)
    }

    /// Deadline expiry or explicit abort: terminate, salvage whatever the
    /// pipeline can still decode, and queue the terminal error behind the
    /// salvaged results.
    async fn abort(&mut self, err: SolveError) {
        warn!("session deadline expired, terminating solver");
        self.terminate_and_wait().await;
        self.salvaged = self.pipeline.salvage().await.into();
        let _ = self.take_stderr().await;
        self.pending_error = Some(err);
        self.state = SessionState::Salvaging;
    }

    async fn terminate_and_wait(&mut self) {
        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                unsafe {
                    libc::killpg(pid as libc::pid_t, libc::SIGTERM);
                }
            }
            if tokio::time::timeout(TERMINATE_GRACE, self.child.wait())
                .await
                .is_ok()
            {
                return;
            }
        }
        let _ = self.child.kill().await;
        let _ = self.child.wait().await;
    }

    async fn take_stderr(&mut self) -> Vec<u8> {
        if let Some(bytes) = &self.stderr_bytes {
            return bytes.clone();
        }
        let bytes = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };
        self.stderr_bytes = Some(bytes.clone());
        bytes
    }
}

fn validate(config: &SessionConfig) -> Result<(), SolveError> {
    if config.executable.as_os_str().is_empty() {
        return Err(SolveError::Configuration(
            "no solver executable configured".into(),
        ));
    }
    match config.multiplicity {
        SolutionMultiplicity::AllSolutions if config.method != Method::Satisfy => {
            Err(SolveError::Configuration(
                "finding all optimal solutions is not supported".into(),
            ))
        }
        SolutionMultiplicity::NSolutions(_) if config.method != Method::Satisfy => {
            Err(SolveError::Configuration(
                "finding multiple optimal solutions is not supported".into(),
            ))
        }
        SolutionMultiplicity::NSolutions(0) => Err(SolveError::Configuration(
            "the number of solutions must be positive".into(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::testing::ChunkedReader;
    use crate::solution::keyword_renames;
    use crate::stats::StatValue;

    fn legacy_pipeline(input: &'static [u8]) -> DecodePipeline<&'static [u8]> {
        DecodePipeline::new(input, Protocol::Legacy, Method::Satisfy, Vec::new(), 1024)
    }

    fn json_pipeline(input: &'static [u8]) -> DecodePipeline<&'static [u8]> {
        DecodePipeline::new(
            input,
            Protocol::JsonStream,
            Method::Maximize,
            Vec::new(),
            1024,
        )
    }

    async fn drain<R: tokio::io::AsyncRead + Unpin>(
        pipeline: &mut DecodePipeline<R>,
    ) -> Vec<SolveResult> {
        let mut results = Vec::new();
        while let Some(result) = pipeline.next_partial().await.unwrap() {
            results.push(result);
        }
        results
    }

    #[tokio::test]
    async fn test_legacy_satisfy_session() {
        // One solution, then search-complete: a satisfied result followed
        // by the ALL_SOLUTIONS terminal result.
        let mut pipeline = legacy_pipeline(b"{\"x\":3}\n----------\n==========\n");
        let results = drain(&mut pipeline).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, Status::Satisfied);
        let solution = results[0].solution.as_ref().unwrap();
        assert_eq!(solution.get("x"), Some(&Value::Int(3)));

        assert_eq!(results[1].status, Status::AllSolutions);
        assert!(results[1].solution.is_none());
    }

    #[tokio::test]
    async fn test_legacy_unsatisfiable_session() {
        let mut pipeline = legacy_pipeline(b"=====UNSATISFIABLE=====\n");
        let results = drain(&mut pipeline).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, Status::Unsatisfiable);
        assert!(results[0].solution.is_none());
        assert!(results[0].statistics.is_empty());
    }

    #[tokio::test]
    async fn test_structured_optimization_session() {
        let input = b"{\"type\":\"solution\",\"output\":{\"json\":{\"_objective\":5}}}\n\
                      {\"type\":\"status\",\"status\":\"OPTIMAL_SOLUTION\"}\n";
        let mut pipeline = json_pipeline(input);
        let results = drain(&mut pipeline).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, Status::Satisfied);
        let solution = results[0].solution.as_ref().unwrap();
        assert_eq!(solution.objective(), Some(&Value::Int(5)));

        assert_eq!(results[1].status, Status::OptimalSolution);
        assert!(results[1].solution.is_none());
    }

    #[tokio::test]
    async fn test_chunking_invariance() {
        // Decoding a stream split at arbitrary points yields the same
        // results as decoding it whole.
        let blob: &[u8] = b"%%%mzn-stat: nodes=7\n{\"x\":1}\n----------\n\
                            {\"x\":2}\n----------\n==========\n";

        let mut whole = legacy_pipeline(blob);
        let expected = drain(&mut whole).await;

        for split in [1usize, 3, 11, 24, blob.len() - 1] {
            let reader = ChunkedReader::new([&blob[..split], &blob[split..]]);
            let mut pipeline =
                DecodePipeline::new(reader, Protocol::Legacy, Method::Satisfy, Vec::new(), 1024);
            let results = drain(&mut pipeline).await;

            assert_eq!(results.len(), expected.len(), "split at {split}");
            for (got, want) in results.iter().zip(&expected) {
                assert_eq!(got.status, want.status, "split at {split}");
                assert_eq!(
                    got.solution.as_ref().map(|s| s.to_string()),
                    want.solution.as_ref().map(|s| s.to_string()),
                    "split at {split}"
                );
                assert_eq!(got.statistics, want.statistics, "split at {split}");
            }
        }
    }

    #[tokio::test]
    async fn test_oversized_message_decodes_once() {
        // A single JSON line larger than the read buffer still arrives as
        // one solution.
        let line = format!(
            "{{\"type\":\"solution\",\"output\":{{\"json\":{{\"xs\":{:?}}}}}}}\n",
            (0..200).collect::<Vec<i32>>()
        );
        let reader = ChunkedReader::new([line.as_bytes().to_vec()]);
        let mut pipeline =
            DecodePipeline::new(reader, Protocol::JsonStream, Method::Satisfy, Vec::new(), 16);

        let mut results = Vec::new();
        while let Some(result) = pipeline.next_partial().await.unwrap() {
            results.push(result);
        }
        assert_eq!(results.len(), 1);
        let solution = results[0].solution.as_ref().unwrap();
        match solution.get("xs") {
            Some(Value::Array(items)) => assert_eq!(items.len(), 200),
            other => panic!("unexpected field value: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_statistics_attributed_to_next_result_only() {
        let input = b"%%%mzn-stat: nodes=5\n{\"x\":1}\n----------\n\
                      {\"x\":2}\n----------\n";
        let mut pipeline = legacy_pipeline(input);
        let results = drain(&mut pipeline).await;

        assert_eq!(results[0].statistics.get("nodes"), Some(&StatValue::Int(5)));
        assert!(results[1].statistics.get("nodes").is_none());
    }

    #[tokio::test]
    async fn test_trailing_statistics_reach_final_result() {
        let input = b"{\"type\":\"solution\",\"output\":{\"json\":{\"x\":1}}}\n\
                      {\"type\":\"status\",\"status\":\"ALL_SOLUTIONS\"}\n\
                      {\"type\":\"statistics\",\"statistics\":{\"nodes\":9}}\n";
        let mut pipeline =
            DecodePipeline::new(input as &[u8], Protocol::JsonStream, Method::Satisfy, Vec::new(), 1024);
        let results = drain(&mut pipeline).await;

        assert_eq!(results.len(), 2);
        assert_eq!(
            results[1].statistics.get("nodes"),
            Some(&StatValue::Int(9))
        );
        assert_eq!(results[1].status, Status::AllSolutions);
    }

    #[tokio::test]
    async fn test_structured_error_aborts_after_salvage() {
        let input = b"{\"type\":\"solution\",\"output\":{\"json\":{\"x\":1}}}\n\
                      {\"type\":\"error\",\"what\":\"evaluation error\",\"message\":\"division by zero\"}\n\
                      {\"type\":\"solution\",\"output\":{\"json\":{\"x\":99}}}\n";
        let mut pipeline =
            DecodePipeline::new(input as &[u8], Protocol::JsonStream, Method::Satisfy, Vec::new(), 1024);

        // The solution before the error is still delivered.
        let first = pipeline.next_partial().await.unwrap().unwrap();
        assert_eq!(
            first.solution.as_ref().unwrap().get("x"),
            Some(&Value::Int(1))
        );

        // The error surfaces next; the solution after it was never decoded.
        let err = loop {
            match pipeline.next_partial().await {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("expected an error"),
                Err(err) => break err,
            }
        };
        assert!(matches!(err, SolveError::Evaluation { .. }));
        assert!(pipeline.next_partial().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_warnings_are_collected_not_fatal() {
        let input = b"{\"type\":\"warning\",\"message\":\"model inconsistency detected\"}\n\
                      {\"type\":\"solution\",\"output\":{\"json\":{\"x\":1}}}\n";
        let mut pipeline =
            DecodePipeline::new(input as &[u8], Protocol::JsonStream, Method::Satisfy, Vec::new(), 1024);
        let results = drain(&mut pipeline).await;

        assert_eq!(results.len(), 1);
        assert_eq!(
            pipeline.warnings(),
            &["model inconsistency detected".to_string()]
        );
    }

    #[tokio::test]
    async fn test_field_renames_applied_in_pipeline() {
        let input = b"{\"type\":\"solution\",\"output\":{\"json\":{\"loop\":4}}}\n";
        let mut pipeline = DecodePipeline::new(
            input as &[u8],
            Protocol::JsonStream,
            Method::Satisfy,
            keyword_renames(["loop"]),
            1024,
        );
        let results = drain(&mut pipeline).await;
        let solution = results[0].solution.as_ref().unwrap();
        assert_eq!(solution.get("mzn_loop"), Some(&Value::Int(4)));
    }

    #[tokio::test]
    async fn test_checker_output_lands_on_next_solution() {
        let input = b"{\"type\":\"checker\",\"output\":{\"raw\":\"CHECK OK\"}}\n\
                      {\"type\":\"solution\",\"output\":{\"json\":{\"x\":1}}}\n";
        let mut pipeline =
            DecodePipeline::new(input as &[u8], Protocol::JsonStream, Method::Satisfy, Vec::new(), 1024);
        let results = drain(&mut pipeline).await;
        assert_eq!(
            results[0].solution.as_ref().unwrap().check(),
            Some("CHECK OK")
        );
    }

    #[test]
    fn test_validate_rejects_all_solutions_for_optimization() {
        let config = SessionConfig::new("minizinc")
            .with_method(Method::Minimize)
            .with_multiplicity(SolutionMultiplicity::AllSolutions);
        assert!(matches!(
            validate(&config),
            Err(SolveError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_solutions() {
        let config =
            SessionConfig::new("minizinc").with_multiplicity(SolutionMultiplicity::NSolutions(0));
        assert!(matches!(
            validate(&config),
            Err(SolveError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_executable() {
        let config = SessionConfig::new("");
        assert!(matches!(
            validate(&config),
            Err(SolveError::Configuration(_))
        ));
    }
}
