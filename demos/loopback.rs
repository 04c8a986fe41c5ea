//! Runs a debuggee context and a debugger frame in one process, connected
//! over loopback TCP, and walks through the main protocol operations.
//!
//! ```sh
//! cargo run --example loopback
//! ```

use std::time::Duration;

use tokio::sync::oneshot;

use luadbg_remote::{
    CommandKind, LuaHandle, LuaStackFrame, LuaVar, RemoteEngine, Result, VarRoot,
};

const PORT: u16 = 51734;
const WAIT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    // The context side: serves variable and eval requests the way an
    // embedded runtime adapter would.
    let context = RemoteEngine::new();
    let responder = context.clone();
    context.set_command_handler(move |cmd| {
        let lua = LuaHandle::from_raw(0x1);
        match cmd.kind() {
            CommandKind::RequestGlobalVarList => {
                let vars = vec![
                    LuaVar::root(lua, VarRoot::Global, -1, "score").with_value("1200", 3),
                    LuaVar::root(lua, VarRoot::Global, -1, "player").with_fields(true),
                ];
                responder.response_var_list(&cmd, &vars).unwrap();
            }
            CommandKind::Eval => {
                responder.response_string(&cmd, "42").unwrap();
            }
            CommandKind::EndConnection => {
                println!("context: session ended");
            }
            other => {
                println!("context: ignoring {}", other.name());
            }
        }
    });

    let starting = context.clone();
    let context_task = tokio::spawn(async move { starting.start_context(PORT, 1, WAIT).await });

    // The frame side: connect, inspect, evaluate, disconnect.
    let frame = RemoteEngine::new();
    frame.set_command_handler(|cmd| {
        println!("frame: inbound {}", cmd.kind().name());
    });
    frame.start_frame("127.0.0.1", PORT, WAIT).await?;
    context_task.await.expect("context task panicked")?;
    println!("connected, ctx id {}", frame.ctx_id());

    let (tx, rx) = oneshot::channel();
    frame.request_global_var_list(move |result| {
        tx.send(result).unwrap();
    })?;
    for var in rx.await.unwrap()? {
        println!("global {} = {}", var.name, var.value);
    }

    let (tx, rx) = oneshot::channel();
    let stack_frame = LuaStackFrame::new(LuaHandle::from_raw(0x1), 0);
    frame.eval("6 * 7", &stack_frame, move |result| {
        tx.send(result).unwrap();
    })?;
    println!("eval 6 * 7 = {}", rx.await.unwrap()?);

    frame.stop(WAIT).await?;
    println!("disconnected");
    Ok(())
}
