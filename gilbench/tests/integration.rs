//! Integration tests for gilbench
//!
//! These tests drive every runner end to end, including real worker
//! processes started from the `gilbench` binary.

use gilbench::{
    CoroutineRunner, LockedCounter, ProcessPoolRunner, RacyCounter, RunError, Runner,
    SequentialRunner, Speedup, SupervisorError, Task, TaskOutput, ThreadPoolRunner, WorkerHandle,
    WorkloadError, available_cores, measure, race, workload,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

fn worker_binary() -> &'static str {
    env!("CARGO_BIN_EXE_gilbench")
}

fn process_pool(workers: usize) -> ProcessPoolRunner {
    ProcessPoolRunner::with_binary(workers, worker_binary())
}

fn kill_worker(pid: u32) {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
    assert_eq!(ret, 0, "kill({pid}) failed");
}

/// Shell wrapper that records its pid in `pid_file`, then execs the worker
/// binary in its place, so the pid is the worker's.
fn pid_recording_wrapper(dir: &Path, pid_file: &Path) -> PathBuf {
    let script = dir.join("worker.sh");
    let body = format!(
        "#!/bin/sh\necho $$ > '{}'\nexec '{}' \"$@\"\n",
        pid_file.display(),
        worker_binary()
    );
    std::fs::write(&script, body).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

/// Smallest power-of-two `n` whose single sum takes at least `target`
fn calibrate_cpu(target: Duration) -> i64 {
    let mut n: i64 = 1 << 20;
    loop {
        let start = Instant::now();
        workload::sum_of_squares(n).unwrap();
        if start.elapsed() >= target || n >= 1 << 34 {
            return n;
        }
        n *= 2;
    }
}

#[test]
fn test_sequential_results_in_order() {
    let tasks: Vec<Task> = (0..5).map(|i| workload::cpu(i * 10).unwrap()).collect();
    let outputs = SequentialRunner.run(&tasks).unwrap();

    assert_eq!(outputs.len(), 5);
    for (i, output) in outputs.iter().enumerate() {
        let expected = workload::sum_of_squares(i as i64 * 10).unwrap();
        assert_eq!(*output, TaskOutput::Sum(expected));
    }
}

#[test]
fn test_all_strategies_agree_with_sequential() {
    let tasks = vec![
        workload::cpu(10_000).unwrap(),
        workload::io_for(Duration::from_millis(5)),
        workload::mixed_for(20_000, Duration::from_millis(5)).unwrap(),
        workload::cpu(0).unwrap(),
    ];
    let expected = SequentialRunner.run(&tasks).unwrap();

    let runners: Vec<Box<dyn Runner>> = vec![
        Box::new(ThreadPoolRunner::new(2)),
        Box::new(CoroutineRunner::new(2)),
        Box::new(process_pool(2)),
    ];
    for runner in runners {
        let outputs = runner.run(&tasks).unwrap();
        assert_eq!(outputs, expected, "{}", runner.strategy());
    }
}

#[test]
fn test_io_waits_overlap_on_threads() {
    let wait = Duration::from_millis(300);
    let tasks = vec![workload::io_for(wait); 2];

    let (seq, seq_time) = measure(|| SequentialRunner.run(&tasks));
    seq.unwrap();
    let seq_elapsed = seq_time.elapsed();
    assert!(seq_elapsed >= wait * 2);
    assert!(seq_elapsed < wait * 2 + wait * 2 / 10, "{seq_elapsed:?}");

    let (par, par_time) = measure(|| ThreadPoolRunner::new(2).run(&tasks));
    par.unwrap();
    assert!(
        par_time.elapsed() < wait.mul_f64(1.8),
        "{:?}",
        par_time.elapsed()
    );
}

#[test]
fn test_cpu_process_pool_runs_in_parallel() {
    let workers = 2;
    if available_cores() < workers {
        eprintln!("skipping: fewer than {workers} cores");
        return;
    }

    let n = calibrate_cpu(Duration::from_millis(250));
    let task = workload::cpu(n).unwrap();

    let (single, single_time) = measure(|| process_pool(1).run(&[task]));
    single.unwrap();

    let tasks = vec![task; workers];
    let (pooled, pooled_time) = measure(|| process_pool(workers).run(&tasks));
    let pooled = pooled.unwrap();

    assert_eq!(pooled.len(), workers);
    assert!(
        pooled_time.elapsed() < single_time.elapsed().mul_f64(1.5),
        "pool {:?} vs single {:?}",
        pooled_time.elapsed(),
        single_time.elapsed()
    );
}

#[test]
fn test_process_pool_more_tasks_than_workers() {
    let tasks: Vec<Task> = (1..=7).map(|i| workload::cpu(i * 1_000).unwrap()).collect();
    let expected = SequentialRunner.run(&tasks).unwrap();
    let outputs = process_pool(3).run(&tasks).unwrap();
    assert_eq!(outputs, expected);
}

#[test]
fn test_invalid_task_reports_its_index() {
    let tasks = vec![
        workload::cpu(10).unwrap(),
        Task::SumOfSquares { n: -1 },
        workload::cpu(10).unwrap(),
    ];
    for runner in [
        Box::new(SequentialRunner) as Box<dyn Runner>,
        Box::new(ThreadPoolRunner::new(2)),
        Box::new(process_pool(2)),
    ] {
        match runner.run(&tasks).unwrap_err() {
            RunError::InvalidArgument(msg) => assert!(msg.contains("task 1"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[test]
fn test_missing_worker_binary() {
    let err = ProcessPoolRunner::with_binary(2, "/nonexistent/gilbench")
        .run(&[workload::cpu(10).unwrap()])
        .unwrap_err();
    assert!(matches!(err, RunError::PoolExhausted(_)), "{err}");
}

#[test]
fn test_worker_killed_mid_task() {
    let mut worker = WorkerHandle::spawn_binary(Path::new(worker_binary())).unwrap();
    let caps = worker.capabilities().unwrap();
    assert_eq!(caps.pid, worker.pid());

    let warmup = workload::cpu(10).unwrap();
    assert_eq!(
        worker.run_task(0, warmup).unwrap(),
        TaskOutput::Sum(workload::sum_of_squares(10).unwrap())
    );

    let pid = worker.pid();
    let killer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        kill_worker(pid);
    });

    let start = Instant::now();
    let err = worker
        .run_task(1, workload::io_for(Duration::from_secs(10)))
        .unwrap_err();
    killer.join().unwrap();

    assert!(start.elapsed() < Duration::from_secs(5));
    match &err {
        SupervisorError::WorkerCrashed(msg) => assert!(msg.contains("signal"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(err.into_workload_error(), WorkloadError::Remote(_)));
}

#[test]
fn test_process_pool_reports_crashed_task_index() {
    let dir = std::env::temp_dir().join(format!("gilbench-crash-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let pid_file = dir.join("worker.pid");
    let runner = ProcessPoolRunner::with_binary(1, pid_recording_wrapper(&dir, &pid_file));
    let tasks = vec![
        workload::cpu(10).unwrap(),
        workload::io_for(Duration::from_secs(10)),
    ];

    // A sibling test forking while the script was still open for writing
    // makes exec fail with ETXTBSY; try again in that case
    let mut attempts = 0;
    let (err, elapsed) = loop {
        attempts += 1;
        let _ = std::fs::remove_file(&pid_file);
        let pid_path = pid_file.clone();
        let killer = std::thread::spawn(move || {
            let deadline = Instant::now() + Duration::from_secs(5);
            while Instant::now() < deadline {
                let pid = std::fs::read_to_string(&pid_path)
                    .ok()
                    .and_then(|s| s.trim().parse::<u32>().ok());
                if let Some(pid) = pid {
                    std::thread::sleep(Duration::from_millis(300));
                    kill_worker(pid);
                    return;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        });

        let start = Instant::now();
        let err = runner.run(&tasks).unwrap_err();
        let elapsed = start.elapsed();
        if matches!(&err, RunError::PoolExhausted(msg) if msg.contains("busy")) && attempts < 3 {
            killer.join().unwrap();
            continue;
        }
        killer.join().unwrap();
        break (err, elapsed);
    };
    let _ = std::fs::remove_dir_all(&dir);

    assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
    match err {
        RunError::WorkloadFailed {
            index,
            cause: WorkloadError::Remote(msg),
        } => {
            assert_eq!(index, 1);
            assert!(msg.contains("crashed"), "{msg}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_race_properties() {
    let locked = race(&LockedCounter::new(), 4, 10_000);
    assert!(locked.is_exact());
    assert_eq!(locked.actual, 40_000);

    let racy = race(&RacyCounter::new(), 4, 10_000);
    assert_eq!(racy.expected, 40_000);
    assert!(racy.actual <= racy.expected);
    assert_eq!(racy.lost, racy.expected - racy.actual);
}

#[test]
fn test_speedup_ratio() {
    let speedup = Speedup::compute(Duration::from_secs(4), Duration::from_secs(2));
    assert_eq!(speedup.ratio(), Some(2.0));
    assert_eq!(speedup.to_string(), "2.00x");
}
