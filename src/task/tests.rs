use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use crate::{call_site, enter_with, raise_new, task::IsolateExt, Stacktrace, TraceHook};

#[derive(Debug)]
struct Timeout(&'static str);

const REQUESTS: [(&str, u32); 3] = [("alpha", 3), ("beta", 1), ("gamma", 2)];

fn request(name: &'static str, hops: u32) -> Pin<Box<dyn Future<Output = Arc<Timeout>> + Send>> {
    Box::pin(async move {
        let _frame = enter_with(call_site!("request"), |scope| {
            scope.local("name", name).local("hops", &hops)
        });
        // hand the worker over to other tasks while this frame is live
        tokio::time::sleep(Duration::from_millis(5)).await;
        if hops == 0 {
            return raise_new(Timeout(name));
        }
        request(name, hops - 1).await
    })
}

fn names(trace: &Stacktrace) -> Vec<String> {
    trace
        .iter()
        .map(|frame| frame.locals().get("name").unwrap().repr().to_owned())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn isolated_tasks_do_not_share_frames() {
    let hook = TraceHook::new();
    let _enabled = hook.enable_guard();

    let tasks: Vec<_> = REQUESTS
        .into_iter()
        .map(|(name, hops)| tokio::spawn(request(name, hops).isolate()))
        .collect();

    for (task, (name, hops)) in tasks.into_iter().zip(REQUESTS) {
        let error = task.await.unwrap();
        assert_eq!(error.0, name);

        let trace = hook.stacktrace(&error).unwrap();
        assert_eq!(trace.len(), hops as usize + 1);
        assert!(names(&trace)
            .iter()
            .all(|recorded| *recorded == format!("{name:?}")));
    }
}

#[tokio::test(flavor = "current_thread")]
async fn interleaved_tasks_on_one_thread() {
    let hook = TraceHook::new();
    let _enabled = hook.enable_guard();

    let (left, right) = tokio::join!(
        request("left", 2).isolate(),
        request("right", 0).isolate(),
    );

    assert_eq!(names(&hook.stacktrace(&left).unwrap()), ["\"left\""; 3]);
    assert_eq!(names(&hook.stacktrace(&right).unwrap()), ["\"right\""]);
    assert_eq!(hook.depth(), 0);
}
