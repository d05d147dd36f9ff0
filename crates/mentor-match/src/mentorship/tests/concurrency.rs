use std::sync::Arc;

use super::common::*;
use crate::mentorship::domain::{Decision, Participation, RequestStatus};
use crate::mentorship::service::MatchingError;

fn codes(results: &[Result<crate::mentorship::MentorshipRequest, MatchingError>]) -> Vec<&'static str> {
    let mut codes: Vec<_> = results
        .iter()
        .filter_map(|result| result.as_ref().err().map(MatchingError::code))
        .collect();
    codes.sort_unstable();
    codes
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_accepts_never_exceed_capacity() {
    let h = harness();
    let requests = [
        h.pending(ADA, LINUS).await,
        h.pending(BEN, LINUS).await,
        h.pending(CY, LINUS).await,
    ];

    let mut handles = Vec::new();
    for request in requests {
        let service = Arc::clone(&h.service);
        handles.push(tokio::spawn(async move {
            service
                .respond(&request.id, user(LINUS), Decision::Accept, None)
                .await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.expect("task completed"));
    }

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert_eq!(codes(&results), vec!["capacity_exceeded", "capacity_exceeded"]);
    assert_eq!(h.active_count(LINUS).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_accepts_for_one_student_leave_a_single_mentor() {
    let h = harness();
    let to_grace = h.pending(ADA, GRACE).await;
    let to_linus = h.pending(ADA, LINUS).await;

    let grace = {
        let service = Arc::clone(&h.service);
        tokio::spawn(async move {
            service
                .respond(&to_grace.id, user(GRACE), Decision::Accept, None)
                .await
        })
    };
    let linus = {
        let service = Arc::clone(&h.service);
        tokio::spawn(async move {
            service
                .respond(&to_linus.id, user(LINUS), Decision::Accept, None)
                .await
        })
    };

    let results = vec![
        grace.await.expect("task completed"),
        linus.await.expect("task completed"),
    ];
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert_eq!(codes(&results), vec!["duplicate_active_mentor"]);

    let accepted = h
        .service
        .list_requests(&user(ADA), Participation::Student)
        .await
        .expect("listed")
        .into_iter()
        .filter(|request| request.status == RequestStatus::Accepted)
        .count();
    assert_eq!(accepted, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_creates_for_one_pair_store_a_single_request() {
    let h = harness();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&h.service);
        handles.push(tokio::spawn(async move {
            service.create_request(new_request(BEN, GRACE)).await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.expect("task completed"));
    }

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(codes(&results)
        .iter()
        .all(|code| *code == "duplicate_pending_request"));
    assert_eq!(h.store.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn accept_racing_termination_keeps_counts_consistent() {
    let h = harness();
    let active = h.accepted(ADA, LINUS).await;
    let waiting = h.pending(BEN, LINUS).await;

    let ending = {
        let service = Arc::clone(&h.service);
        tokio::spawn(async move {
            service
                .terminate(
                    &active.id,
                    crate::mentorship::service::Terminator::Mentor(user(LINUS)),
                    "Wrapped up",
                )
                .await
        })
    };
    let accepting = {
        let service = Arc::clone(&h.service);
        tokio::spawn(async move {
            service
                .respond(&waiting.id, user(LINUS), Decision::Accept, None)
                .await
        })
    };

    ending
        .await
        .expect("task completed")
        .expect("termination always succeeds");
    let accept = accepting.await.expect("task completed");

    // The accept either saw the slot freed or was refused for capacity; never both active.
    match accept {
        Ok(_) => assert_eq!(h.active_count(LINUS).await, 1),
        Err(err) => {
            assert_eq!(err.code(), "capacity_exceeded");
            assert_eq!(h.active_count(LINUS).await, 0);
        }
    }
}
