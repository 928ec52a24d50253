use std::{hint::black_box, sync::Arc, time::Instant};

use clap::Parser;
use raisetrace::{call_site, enter, enter_with, raise_new, TraceHook};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, thiserror::Error)]
enum MathError {
    #[error("divided by 0")]
    DivisionByZero,
}

fn divide(a: i64, b: i64) -> Result<i64, Arc<MathError>> {
    a.checked_div(b)
        .ok_or_else(|| raise_new(MathError::DivisionByZero))
}

fn bar() -> Result<i64, Arc<MathError>> {
    let _frame = enter(call_site!("bar"));
    divide(1, 0)
}

fn foo(pass: bool, depth: u32) -> Result<(), Arc<MathError>> {
    let _frame = enter_with(call_site!("foo"), |scope| {
        scope.local("pass", &pass).local("depth", &depth)
    });
    if depth == 0 {
        if !pass {
            bar()?;
        }
        return Ok(());
    }
    foo(pass, depth - 1)
}

#[derive(Parser)]
#[command(name = "demo-program", about = "Prints the stacktrace raisetrace captures for a failing call")]
struct Cli {
    /// How many times `foo` recurses before calling `bar`
    #[arg(default_value_t = 3)]
    depth: u32,
    /// Time calls with and without an enabled hook afterwards
    #[arg(long)]
    bench: bool,
}

const DEPTH: u32 = 100;
const ITERATIONS: u32 = 200_000;

fn report(label: &str, f: impl FnOnce()) {
    let start = Instant::now();
    f();
    println!("{label:>12}  {:?}", start.elapsed());
}

fn bench() {
    let hook = TraceHook::new();

    report("exc:normal", || {
        for _ in 0..ITERATIONS {
            let _ = black_box(foo(false, DEPTH));
        }
    });
    report("exc:capture", || {
        hook.enable(|| {
            for _ in 0..ITERATIONS {
                let _ = black_box(foo(false, DEPTH));
            }
        })
    });
    report("pass:normal", || {
        for _ in 0..ITERATIONS {
            let _ = black_box(foo(true, DEPTH));
        }
    });
    report("pass:capture", || {
        hook.enable(|| {
            for _ in 0..ITERATIONS {
                let _ = black_box(foo(true, DEPTH));
            }
        })
    });
}

fn main() {
    let cli = Cli::parse();

    let registry = tracing_subscriber::Registry::default().with(
        EnvFilter::builder()
            .with_default_directive(tracing::Level::INFO.into())
            .from_env()
            .unwrap(),
    );

    let tree_layer = tracing_tree::HierarchicalLayer::new(2)
        .with_targets(true)
        .with_bracketed_fields(true);

    registry.with(tree_layer).init();

    let result = raisetrace::capture_with(
        || foo(false, cli.depth),
        |error, stacktrace| {
            println!("{error}");
            match stacktrace {
                Some(stacktrace) => {
                    for frame in stacktrace {
                        println!("{frame}");
                    }
                }
                None => println!("no stacktrace attached"),
            }
        },
    );
    assert!(result.is_err());

    if cli.bench {
        bench();
    }
}
