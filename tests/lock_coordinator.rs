// tests/lock_coordinator.rs

use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use cronlock::errors::CronlockError;
use cronlock::lock::{LockCoordinator, LockId};
use tempfile::tempdir;

#[test]
fn file_names_include_environment() {
    assert_eq!(LockId::new("backup", None).file_name(), "backup.lck");
    assert_eq!(LockId::new("backup", Some("prod")).file_name(), "prod-backup.lck");
    assert_eq!(LockId::new("backup", Some("")).file_name(), "backup.lck");
}

#[test]
fn file_names_are_collision_free() {
    // Without escaping both would be `a-b-c.lck`.
    let one = LockId::new("b-c", Some("a")).file_name();
    let two = LockId::new("c", Some("a-b")).file_name();
    assert_ne!(one, two);

    let slashed = LockId::new("../etc/passwd", None).file_name();
    assert!(!slashed.contains('/'), "{slashed}");
}

#[test]
fn acquire_writes_pid_and_release_removes() {
    let dir = tempdir().unwrap();
    let locks = LockCoordinator::new(dir.path());
    let id = LockId::new("job", Some("test"));

    let lock = locks.acquire(&id).unwrap();
    let path = locks.path_of(&id);
    assert_eq!(lock.path(), path.as_path());
    assert_eq!(fs::read_to_string(&path).unwrap(), std::process::id().to_string());
    assert!(locks.is_held(&id).unwrap());

    locks.release(lock).unwrap();
    assert!(!path.exists());
    assert!(!locks.is_held(&id).unwrap());
}

#[test]
fn second_acquire_fails_fast() {
    let dir = tempdir().unwrap();
    let locks = LockCoordinator::new(dir.path());
    let id = LockId::new("job", None);

    let _first = locks.acquire(&id).unwrap();
    match locks.acquire(&id) {
        Err(CronlockError::LockHeld { path }) => assert_eq!(path, locks.path_of(&id)),
        Err(e) => panic!("Expected LockHeld, got {:?}", e),
        Ok(_) => panic!("Expected LockHeld, got Ok"),
    }
}

#[test]
fn environments_do_not_share_locks() {
    let dir = tempdir().unwrap();
    let locks = LockCoordinator::new(dir.path());

    let _prod = locks.acquire(&LockId::new("job", Some("prod"))).unwrap();
    let _dev = locks.acquire(&LockId::new("job", Some("dev"))).unwrap();
    let _none = locks.acquire(&LockId::new("job", None)).unwrap();
}

#[test]
fn release_is_idempotent_and_tolerates_external_removal() {
    let dir = tempdir().unwrap();
    let locks = LockCoordinator::new(dir.path());
    let id = LockId::new("job", None);

    let mut lock = locks.acquire(&id).unwrap();
    fs::remove_file(locks.path_of(&id)).unwrap();
    lock.release().unwrap();
    lock.release().unwrap();
}

#[test]
fn dropping_a_lock_releases_it() {
    let dir = tempdir().unwrap();
    let locks = LockCoordinator::new(dir.path());
    let id = LockId::new("job", None);

    {
        let _lock = locks.acquire(&id).unwrap();
        assert!(locks.path_of(&id).exists());
    }
    assert!(!locks.path_of(&id).exists());
    let _again = locks.acquire(&id).unwrap();
}

#[test]
fn age_is_none_without_lock_and_grows_while_held() {
    let dir = tempdir().unwrap();
    let locks = LockCoordinator::new(dir.path());
    let id = LockId::new("job", None);

    assert_eq!(locks.age(&id).unwrap(), None);

    let _lock = locks.acquire(&id).unwrap();
    thread::sleep(Duration::from_millis(1100));
    let age = locks.age(&id).unwrap().expect("held lock has an age");
    assert!(age >= Duration::from_secs(1), "{age:?}");
}

#[test]
fn file_left_by_a_dead_owner_is_taken_over() {
    let dir = tempdir().unwrap();
    let locks = LockCoordinator::new(dir.path());
    let id = LockId::new("job", None);

    // No process can have this PID, and nobody holds the file.
    fs::write(locks.path_of(&id), "4294967295").unwrap();
    assert!(!locks.is_held(&id).unwrap());
    assert_eq!(locks.age(&id).unwrap(), None);

    let lock = locks.acquire(&id).unwrap();
    assert_eq!(
        fs::read_to_string(lock.path()).unwrap(),
        std::process::id().to_string()
    );
    assert!(locks.is_held(&id).unwrap());
}

#[test]
fn unlocked_file_is_free_whatever_pid_it_names() {
    let dir = tempdir().unwrap();
    let locks = LockCoordinator::new(dir.path());
    let id = LockId::new("job", None);

    // A live PID (ours) left in a file nobody holds, as after PID reuse.
    fs::write(locks.path_of(&id), std::process::id().to_string()).unwrap();
    assert!(!locks.is_held(&id).unwrap());

    let _lock = locks.acquire(&id).unwrap();
    assert!(locks.is_held(&id).unwrap());
}

#[test]
fn empty_unlocked_file_is_not_held() {
    let dir = tempdir().unwrap();
    let locks = LockCoordinator::new(dir.path());
    let id = LockId::new("job", None);

    fs::write(locks.path_of(&id), "").unwrap();
    assert!(!locks.is_held(&id).unwrap());
    let _lock = locks.acquire(&id).unwrap();
}

#[cfg(unix)]
#[test]
fn release_leaves_a_successors_lock_alone() {
    let dir = tempdir().unwrap();
    let locks = LockCoordinator::new(dir.path());
    let id = LockId::new("job", None);

    let mut first = locks.acquire(&id).unwrap();
    fs::remove_file(locks.path_of(&id)).unwrap();
    let second = locks.acquire(&id).unwrap();

    first.release().unwrap();
    assert!(locks.path_of(&id).exists());
    assert!(locks.is_held(&id).unwrap());
    assert!(matches!(locks.acquire(&id), Err(CronlockError::LockHeld { .. })));

    drop(second);
    assert!(!locks.path_of(&id).exists());
    assert!(!locks.is_held(&id).unwrap());
}

#[test]
fn racers_on_a_dead_owners_file_get_exactly_one_lock() {
    const RACERS: usize = 16;

    let dir = tempdir().unwrap();
    let id = LockId::new("race", None);
    let path = LockCoordinator::new(dir.path()).path_of(&id);

    for trial in 0..200 {
        fs::write(&path, "4294967295").unwrap();

        let start = Arc::new(Barrier::new(RACERS));
        let done = Arc::new(Barrier::new(RACERS));
        let handles: Vec<_> = (0..RACERS)
            .map(|_| {
                let locks = LockCoordinator::new(dir.path());
                let id = id.clone();
                let start = Arc::clone(&start);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    start.wait();
                    let result = locks.acquire(&id);
                    // Winners hold on until every racer has tried.
                    done.wait();
                    result.is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1, "trial {trial}");
    }
}

#[test]
fn acquire_and_release_cycles_never_overlap() {
    const WORKERS: usize = 8;

    let dir = tempdir().unwrap();
    let id = LockId::new("cycle", None);
    let inside = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let locks = LockCoordinator::new(dir.path());
            let id = id.clone();
            let inside = Arc::clone(&inside);
            thread::spawn(move || {
                use std::sync::atomic::Ordering;

                let mut held = 0;
                for _ in 0..200 {
                    if let Ok(lock) = locks.acquire(&id) {
                        let before = inside.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(before, 0, "two holders at once");
                        held += 1;
                        inside.fetch_sub(1, Ordering::SeqCst);
                        locks.release(lock).unwrap();
                    }
                }
                held
            })
        })
        .collect();

    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert!(total > 0);
}

#[test]
fn concurrent_acquirers_get_exactly_one_lock() {
    let dir = tempdir().unwrap();
    let path = dir.path().to_path_buf();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let path = path.clone();
            thread::spawn(move || {
                let locks = LockCoordinator::new(path);
                // Keep the winner's lock alive until every thread has tried.
                let result = locks.acquire(&LockId::new("race", None));
                thread::sleep(Duration::from_millis(200));
                result.is_ok()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}
