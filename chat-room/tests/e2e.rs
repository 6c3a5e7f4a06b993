use std::{
    path::Path,
    process::Stdio,
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    time::timeout,
};

const READ_TIMEOUT: Duration = Duration::from_secs(3);

#[tokio::test]
async fn cli_chat_end_to_end() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin("chat-room");
    let users = std::env::temp_dir().join(format!("chat-room-e2e-{}.txt", nanoid::nanoid!()));

    let (mut server_child, mut server_stdout) = spawn_server(&binary, &users).await?;
    let port = read_server_port(&mut server_stdout).await?;

    // Drain additional server logs in the background so the pipe never fills.
    let server_log_task = tokio::spawn(async move {
        drain_stdout(server_stdout).await;
    });

    let mut bob = spawn_client(&binary, port).await?;

    // Requests the client refuses locally never reach the server.
    bob.send_line("send too early").await?;
    assert_eq!(
        read_line_expect(&mut bob.stdout, "waiting for local login guard").await?,
        "> Denied. Please login first."
    );
    bob.send_line("newuser bo pass1").await?;
    assert_eq!(
        read_line_expect(&mut bob.stdout, "waiting for local shape check").await?,
        "> Invalid UserID or Password format."
    );

    bob.send_line("newuser bob pass1").await?;
    assert_eq!(
        read_line_expect(&mut bob.stdout, "waiting for account creation").await?,
        "> New user account created. Please login."
    );

    bob.send_line("login bob pass1").await?;
    assert_eq!(
        read_line_expect(&mut bob.stdout, "waiting for login").await?,
        "> login confirmed"
    );

    bob.send_line("send hi there").await?;
    assert_eq!(
        read_line_expect(&mut bob.stdout, "waiting for relayed message").await?,
        "> bob: hi there"
    );

    bob.send_line("logout").await?;
    assert_eq!(
        read_line_expect(&mut bob.stdout, "waiting for logout").await?,
        "> bob left."
    );
    ensure_success(&mut bob.child, "bob client").await?;

    let persisted = std::fs::read_to_string(&users).context("read users file")?;
    assert_eq!(persisted, "(bob, pass1)\n");

    // Server stays up after clients disconnect; terminate it manually.
    let _ = server_child.kill().await;
    let _ = server_child.wait().await;
    let _ = server_log_task.await;
    let _ = std::fs::remove_file(&users);

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn interrupted_client_closes_the_connection() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin("chat-room");
    let users = std::env::temp_dir().join(format!("chat-room-e2e-{}.txt", nanoid::nanoid!()));

    let (mut server_child, mut server_stdout) = spawn_server(&binary, &users).await?;
    let port = read_server_port(&mut server_stdout).await?;
    let server_log_task = tokio::spawn(async move {
        drain_stdout(server_stdout).await;
    });

    let mut alice = spawn_client(&binary, port).await?;

    // One answered line means the loop is running and the handler is installed.
    alice.send_line("send too early").await?;
    assert_eq!(
        read_line_expect(&mut alice.stdout, "waiting for local login guard").await?,
        "> Denied. Please login first."
    );

    let pid = alice.child.id().context("client exited early")?;
    let status = Command::new("kill")
        .args(["-INT", &pid.to_string()])
        .status()
        .await
        .context("failed to signal client")?;
    assert!(status.success());

    assert_eq!(
        read_line_expect(&mut alice.stdout, "waiting for close notice").await?,
        "Closing connection..."
    );
    ensure_success(&mut alice.child, "alice client").await?;

    let _ = server_child.kill().await;
    let _ = server_child.wait().await;
    let _ = server_log_task.await;
    let _ = std::fs::remove_file(&users);

    Ok(())
}

#[tokio::test]
async fn client_reports_unreachable_server() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin("chat-room");

    // Bind and drop a listener to find a port nothing is listening on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.local_addr()?.port()
    };

    let port = port.to_string();
    let output = Command::new(&binary)
        .args(["client", "127.0.0.1", "--port", port.as_str()])
        .env("RUST_LOG", "warn")
        .stdin(Stdio::null())
        .output()
        .await
        .context("failed to run client")?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Failed to connect"),
        "unexpected client output: {stdout}"
    );

    Ok(())
}

struct ClientProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl ClientProcess {
    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.stdin
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to send line '{line}'"))?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }
}

async fn spawn_server(binary: &Path, users: &Path) -> Result<(Child, BufReader<ChildStdout>)> {
    let mut cmd = Command::new(binary);
    cmd.arg("server")
        .arg("--listen")
        .arg("127.0.0.1:0")
        .arg("--users")
        .arg(users)
        .env("RUST_LOG", "info")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd.spawn().context("failed to spawn server")?;
    let stdout = child
        .stdout
        .take()
        .context("server stdout missing after spawn")?;

    Ok((child, BufReader::new(stdout)))
}

/// Skips startup output until the listening banner, then returns its port.
async fn read_server_port(reader: &mut BufReader<ChildStdout>) -> Result<u16> {
    loop {
        let line = read_line(reader)
            .await?
            .context("server did not emit listening address")?;
        if !line.contains("listening on") {
            continue;
        }

        let addr = line
            .split_whitespace()
            .last()
            .context("unexpected server banner format")?;
        let port = addr
            .rsplit(':')
            .next()
            .map(|port| port.trim_end_matches(|c: char| !c.is_ascii_digit()))
            .and_then(|port| port.parse().ok())
            .ok_or_else(|| anyhow!("server banner missing socket: {line}"))?;
        return Ok(port);
    }
}

async fn spawn_client(binary: &Path, port: u16) -> Result<ClientProcess> {
    let mut cmd = Command::new(binary);
    cmd.arg("client")
        .arg("127.0.0.1")
        .arg("--port")
        .arg(port.to_string())
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd.spawn().context("failed to spawn client")?;

    let stdin = child
        .stdin
        .take()
        .context("client stdin missing after spawn")?;
    let stdout = child
        .stdout
        .take()
        .context("client stdout missing after spawn")?;

    let mut process = ClientProcess {
        child,
        stdin,
        stdout: BufReader::new(stdout),
    };

    let banner = read_line_expect(&mut process.stdout, "waiting for client banner").await?;
    if banner != "My chat room client. Version One." {
        return Err(anyhow!("unexpected client banner '{banner}'"));
    }

    Ok(process)
}

async fn read_line_expect(
    reader: &mut BufReader<ChildStdout>,
    description: &str,
) -> Result<String> {
    match read_line(reader).await {
        Ok(Some(line)) => Ok(line),
        Ok(None) => Err(anyhow!("{description}: stream closed")),
        Err(err) => Err(err.context(format!("{description}: failed to read line"))),
    }
}

async fn read_line(reader: &mut BufReader<ChildStdout>) -> Result<Option<String>> {
    let mut line = String::new();
    let read_future = reader.read_line(&mut line);
    let bytes_io = match timeout(READ_TIMEOUT, read_future).await {
        Ok(result) => result,
        Err(_) => return Err(anyhow!("timed out waiting for line")),
    };
    let byte_count = bytes_io?;
    if byte_count == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

async fn drain_stdout(mut reader: BufReader<ChildStdout>) {
    let mut buffer = String::new();
    while reader
        .read_line(&mut buffer)
        .await
        .map(|bytes| {
            let has_data = bytes > 0;
            if has_data {
                buffer.clear();
            }
            has_data
        })
        .unwrap_or(false)
    {}
}

async fn ensure_success(child: &mut Child, name: &str) -> Result<()> {
    let status = timeout(READ_TIMEOUT, child.wait())
        .await
        .with_context(|| format!("{name} did not exit"))?
        .with_context(|| format!("failed to await {name} process"))?;
    if !status.success() {
        return Err(anyhow!("{name} exited with status {status}"));
    }
    Ok(())
}
