//! A small RESP client: one primary, any number of replicas.
//!
//! Each node owns a single connection guarded by an async mutex, so commands
//! to one node are serialized. Commands pick their node from the routing part
//! of their [`CommandFlags`] (see [`crate::routing::plan_route`]). A node
//! whose connection failed is reconnected on next use.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::future::{self, BoxFuture};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;

use crate::config::{ConnectionOptions, RedisEndpoint};
use crate::connection::{
    ConnectionEvent, Database, EventHandler, EventHub, HandlerId, Multiplexer, ServerInfo,
    ServerRole,
};
use crate::error::{Error, Result};
use crate::flags::CommandFlags;
use crate::resp::{Frame, RespStream, RespVersion, encode_command};
use crate::routing::{Route, plan_route};
use crate::stats::Stats;
use crate::types::{HashEntry, RedisKey, RedisResult, RedisValue, When};

struct Conn {
    stream: RespStream,
    db: u32,
    /// A request was written and its reply is not fully read yet.
    awaiting_reply: bool,
}

struct Node {
    endpoint: RedisEndpoint,
    role: ServerRole,
    slot: Arc<Mutex<Option<Conn>>>,
    connected: AtomicBool,
    failed: AtomicBool,
}

impl Node {
    fn new(endpoint: RedisEndpoint, role: ServerRole, conn: Option<Conn>) -> Self {
        let connected = conn.is_some();
        Self {
            endpoint,
            role,
            slot: Arc::new(Mutex::new(conn)),
            connected: AtomicBool::new(connected),
            failed: AtomicBool::new(!connected),
        }
    }

    fn info(&self) -> ServerInfo {
        ServerInfo {
            endpoint: self.endpoint.address(),
            role: self.role,
            connected: self.connected.load(Ordering::Relaxed),
        }
    }
}

struct Shared {
    options: ConnectionOptions,
    primary: Arc<Node>,
    replicas: Vec<Arc<Node>>,
    next_replica: AtomicUsize,
    operations: AtomicU64,
    connecting: AtomicUsize,
    closed: AtomicBool,
    events: EventHub,
    stats: Stats,
}

pub struct RespMultiplexer {
    shared: Arc<Shared>,
}

impl RespMultiplexer {
    /// Connect to every configured endpoint and classify them with `ROLE`.
    ///
    /// Endpoints that cannot be reached are kept and connected lazily; their
    /// role is inferred from their position (the first one is the primary).
    pub async fn connect(options: ConnectionOptions) -> Result<Self> {
        if options.endpoints.is_empty() {
            return Err(Error::Config("no endpoints configured".to_string()));
        }

        let attempts =
            future::join_all(options.endpoints.iter().map(|ep| open_connection(ep, &options))).await;

        let mut candidates: Vec<(RedisEndpoint, Result<Conn>, ServerRole, bool)> =
            Vec::with_capacity(attempts.len());
        for (idx, (endpoint, attempt)) in options.endpoints.iter().zip(attempts).enumerate() {
            let presumed = if idx == 0 {
                ServerRole::Primary
            } else {
                ServerRole::Replica
            };
            match attempt {
                Ok((conn, role)) => {
                    tracing::info!(endpoint = %endpoint, role = ?role, "connected");
                    candidates.push((endpoint.clone(), Ok(conn), role.unwrap_or(presumed), role.is_some()));
                }
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint, error = %e, "endpoint unavailable at connect");
                    candidates.push((endpoint.clone(), Err(e), presumed, false));
                }
            }
        }

        let primary_idx = candidates
            .iter()
            .position(|(_, conn, role, confirmed)| {
                *confirmed && conn.is_ok() && *role == ServerRole::Primary
            })
            .or_else(|| {
                candidates
                    .iter()
                    .position(|(_, _, role, _)| *role == ServerRole::Primary)
            })
            .ok_or_else(|| Error::NoConnectionAvailable("primary (no endpoint is a primary)".into()))?;

        let mut primary = None;
        let mut replicas = Vec::new();
        for (idx, (endpoint, conn, role, _)) in candidates.into_iter().enumerate() {
            if idx == primary_idx {
                let conn = match conn {
                    Ok(conn) => Some(conn),
                    Err(e) if options.abort_on_connect_fail => {
                        return Err(Error::NoConnectionAvailable(format!("primary {endpoint}: {e}")));
                    }
                    Err(_) => None,
                };
                primary = Some(Arc::new(Node::new(endpoint, ServerRole::Primary, conn)));
            } else if role == ServerRole::Replica {
                replicas.push(Arc::new(Node::new(endpoint, ServerRole::Replica, conn.ok())));
            } else {
                tracing::warn!(endpoint = %endpoint, "ignoring additional primary");
            }
        }

        let primary = primary.ok_or_else(|| Error::NoConnectionAvailable("primary".into()))?;
        tracing::info!(
            primary = %primary.endpoint,
            replicas = replicas.len(),
            "multiplexer ready"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                options,
                primary,
                replicas,
                next_replica: AtomicUsize::new(0),
                operations: AtomicU64::new(0),
                connecting: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                events: EventHub::new(),
                stats: Stats::new(),
            }),
        })
    }

    pub fn stats(&self) -> &Stats {
        &self.shared.stats
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.shared.options
    }
}

impl Shared {
    async fn execute(
        self: &Arc<Self>,
        db: Option<u32>,
        parts: Vec<Bytes>,
        flags: CommandFlags,
    ) -> Result<RedisResult> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed("multiplexer closed".to_string()));
        }
        let name = parts
            .first()
            .ok_or_else(|| Error::Protocol("empty command".to_string()))?;
        let cmd_upper = ascii_upper(name);

        self.operations.fetch_add(1, Ordering::Relaxed);
        let plan = plan_route(&cmd_upper, flags.node_preference(), !self.replicas.is_empty())?;
        let request = encode_command(&parts).freeze();
        let fire_and_forget = flags.contains(CommandFlags::FIRE_AND_FORGET);

        self.stats.record(plan.route, &cmd_upper);
        match self.run_on(plan.route, db, &request, fire_and_forget).await {
            Err(e) if e.is_connection_failure() => {
                let Some(fallback) = plan.fallback else {
                    return Err(e);
                };
                tracing::warn!(
                    error = %e,
                    command = %cmd_upper,
                    from = ?plan.route,
                    to = ?fallback,
                    "node unavailable; falling back"
                );
                self.stats.record_fallback(plan.route, &cmd_upper);
                self.run_on(fallback, db, &request, fire_and_forget).await
            }
            other => other,
        }
    }

    fn node(&self, route: Route) -> Result<&Arc<Node>> {
        match route {
            Route::Primary => Ok(&self.primary),
            Route::Replica => {
                let n = self.replicas.len().max(1);
                let idx = self.next_replica.fetch_add(1, Ordering::Relaxed) % n;
                self.replicas
                    .get(idx)
                    .ok_or_else(|| Error::NoConnectionAvailable("replica".to_string()))
            }
        }
    }

    async fn run_on(
        self: &Arc<Self>,
        route: Route,
        db: Option<u32>,
        request: &Bytes,
        fire_and_forget: bool,
    ) -> Result<RedisResult> {
        let node = self.node(route)?.clone();
        let mut slot = node.slot.clone().lock_owned().await;
        if slot.as_ref().is_some_and(|conn| conn.awaiting_reply) {
            // A cancelled call left its reply on the socket.
            tracing::debug!(endpoint = %node.endpoint, "discarding connection with an unread reply");
            *slot = None;
        }
        if slot.is_none() {
            let conn = self.reconnect(&node).await?;
            *slot = Some(conn);
        }

        let endpoint = node.endpoint.address();
        let target_db = db.or(node.endpoint.db).unwrap_or(0);
        let command_timeout = self.options.command_timeout;

        let sent = match slot.as_mut() {
            Some(conn) => send(conn, target_db, request, command_timeout, &endpoint).await,
            None => Err(Error::ConnectionClosed(endpoint.clone())),
        };
        if let Err(e) = sent {
            if e.is_connection_failure() {
                self.drop_connection(&node, &mut slot, &e);
            }
            return Err(e);
        }

        if fire_and_forget {
            // The guard moves into the drain task so the next command on this
            // node waits until the reply has been consumed.
            let shared = Arc::clone(self);
            tokio::spawn(async move {
                let mut slot = slot;
                let drained = match slot.as_mut() {
                    Some(conn) => read_reply(conn, command_timeout, &endpoint).await.map(|_| ()),
                    None => Ok(()),
                };
                if let Err(e) = drained {
                    tracing::debug!(error = %e, endpoint = %endpoint, "fire-and-forget reply lost");
                    if e.is_connection_failure() {
                        shared.drop_connection(&node, &mut slot, &e);
                    }
                }
            });
            return Ok(RedisResult::Nil);
        }

        let reply = match slot.as_mut() {
            Some(conn) => read_reply(conn, command_timeout, &endpoint).await,
            None => Err(Error::ConnectionClosed(endpoint.clone())),
        };
        match reply {
            Ok(frame) => {
                let result = frame.into_result();
                if let Err(Error::Server(message)) = &result {
                    self.events.emit(&ConnectionEvent::ErrorMessage {
                        endpoint,
                        message: message.clone(),
                    });
                }
                result
            }
            Err(e) => {
                if e.is_connection_failure() {
                    self.drop_connection(&node, &mut slot, &e);
                }
                Err(e)
            }
        }
    }

    async fn reconnect(&self, node: &Node) -> Result<Conn> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed("multiplexer closed".to_string()));
        }

        self.connecting.fetch_add(1, Ordering::Relaxed);
        let attempt = open_connection(&node.endpoint, &self.options).await;
        self.connecting.fetch_sub(1, Ordering::Relaxed);

        match attempt {
            Ok((conn, _role)) => {
                node.connected.store(true, Ordering::Relaxed);
                if node.failed.swap(false, Ordering::Relaxed) {
                    tracing::info!(endpoint = %node.endpoint, "connection restored");
                    self.events.emit(&ConnectionEvent::ConnectionRestored {
                        endpoint: node.endpoint.address(),
                    });
                }
                Ok(conn)
            }
            Err(e) => {
                tracing::debug!(endpoint = %node.endpoint, error = %e, "reconnect failed");
                self.events.emit(&ConnectionEvent::ConnectionFailed {
                    endpoint: node.endpoint.address(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn drop_connection(&self, node: &Node, slot: &mut OwnedMutexGuard<Option<Conn>>, error: &Error) {
        **slot = None;
        node.connected.store(false, Ordering::Relaxed);
        node.failed.store(true, Ordering::Relaxed);
        tracing::warn!(endpoint = %node.endpoint, error = %error, "connection dropped");
        self.events.emit(&ConnectionEvent::ConnectionFailed {
            endpoint: node.endpoint.address(),
            reason: error.to_string(),
        });
    }

    fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        std::iter::once(&self.primary).chain(self.replicas.iter())
    }
}

async fn send(
    conn: &mut Conn,
    target_db: u32,
    request: &Bytes,
    command_timeout: Duration,
    endpoint: &str,
) -> Result<()> {
    if conn.db != target_db {
        let db = target_db.to_string();
        conn.awaiting_reply = true;
        conn.stream.send_command(&["SELECT", db.as_str()]).await?;
        read_reply(conn, command_timeout, endpoint)
            .await?
            .into_result()?;
        conn.db = target_db;
    }
    conn.awaiting_reply = true;
    conn.stream.write_all(request.as_ref()).await
}

async fn read_reply(conn: &mut Conn, command_timeout: Duration, endpoint: &str) -> Result<Frame> {
    match timeout(command_timeout, conn.stream.read_reply(endpoint)).await {
        Ok(Ok(frame)) => {
            conn.awaiting_reply = false;
            Ok(frame)
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(Error::Timeout {
            endpoint: endpoint.to_string(),
            after: command_timeout,
        }),
    }
}

async fn open_connection(
    endpoint: &RedisEndpoint,
    options: &ConnectionOptions,
) -> Result<(Conn, Option<ServerRole>)> {
    match timeout(options.connect_timeout, connect_and_handshake(endpoint, options)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            endpoint: endpoint.address(),
            after: options.connect_timeout,
        }),
    }
}

async fn connect_and_handshake(
    endpoint: &RedisEndpoint,
    options: &ConnectionOptions,
) -> Result<(Conn, Option<ServerRole>)> {
    let addr = (&endpoint.host[..], endpoint.port);
    let sock = TcpStream::connect(addr).await?;
    sock.set_nodelay(true)?;

    let mut stream = RespStream::new(sock, RespVersion::Resp2);

    if let Some(pass) = &endpoint.password {
        match &endpoint.username {
            Some(user) => handshake_step(&mut stream, &["AUTH", user.as_str(), pass.as_str()], endpoint).await?,
            // Password-only AUTH is valid and implies the default user.
            None => handshake_step(&mut stream, &["AUTH", pass.as_str()], endpoint).await?,
        }
    }

    match options.protocol {
        RespVersion::Resp3 => {
            let mut parts = vec!["HELLO", "3"];
            if let Some(name) = &options.client_name {
                parts.push("SETNAME");
                parts.push(name);
            }
            // Decode the HELLO response as RESP3 already.
            stream.send_command(&parts).await?;
            stream.set_version(RespVersion::Resp3);
            expect_ok_reply(&mut stream, "HELLO", endpoint).await?;
        }
        RespVersion::Resp2 => {
            if let Some(name) = &options.client_name {
                handshake_step(&mut stream, &["CLIENT", "SETNAME", name.as_str()], endpoint).await?;
            }
        }
    }

    if let Some(db) = endpoint.db {
        let db = db.to_string();
        handshake_step(&mut stream, &["SELECT", db.as_str()], endpoint).await?;
    }

    // ROLE may be unavailable (ACLs, old servers); the caller infers the role then.
    stream.send_command(&["ROLE"]).await?;
    let role = match stream.read_reply(&endpoint.address()).await?.into_result() {
        Ok(RedisResult::Array(items)) => match items.first() {
            Some(RedisResult::Bulk(b)) if b.as_ref() == b"master" => Some(ServerRole::Primary),
            Some(RedisResult::Bulk(b)) if b.as_ref() == b"slave" || b.as_ref() == b"replica" => {
                Some(ServerRole::Replica)
            }
            _ => None,
        },
        Ok(_) | Err(Error::Server(_)) => None,
        Err(e) => return Err(e),
    };

    Ok((
        Conn {
            stream,
            db: endpoint.db.unwrap_or(0),
            awaiting_reply: false,
        },
        role,
    ))
}

async fn handshake_step(stream: &mut RespStream, parts: &[&str], endpoint: &RedisEndpoint) -> Result<()> {
    stream.send_command(parts).await?;
    expect_ok_reply(stream, parts.first().copied().unwrap_or_default(), endpoint).await
}

async fn expect_ok_reply(stream: &mut RespStream, what: &str, endpoint: &RedisEndpoint) -> Result<()> {
    let frame = stream.read_reply(&endpoint.address()).await?;
    if frame.is_error() {
        let reason = frame.into_result().err().map(|e| e.to_string()).unwrap_or_default();
        return Err(Error::Server(format!("{what} failed on {endpoint}: {reason}")));
    }
    Ok(())
}

fn ascii_upper(bytes: &Bytes) -> String {
    bytes
        .iter()
        .map(|b| b.to_ascii_uppercase() as char)
        .collect()
}

impl Multiplexer for RespMultiplexer {
    fn database(&self, db: Option<u32>) -> Arc<dyn Database> {
        Arc::new(RespDatabase {
            shared: Arc::clone(&self.shared),
            db,
        })
    }

    fn client_name(&self) -> String {
        self.shared
            .options
            .client_name
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
    }

    fn configuration(&self) -> String {
        self.shared.options.to_string()
    }

    fn timeout(&self) -> Duration {
        self.shared.options.command_timeout
    }

    fn operation_count(&self) -> u64 {
        self.shared.operations.load(Ordering::Relaxed)
    }

    fn is_connected(&self) -> bool {
        !self.shared.closed.load(Ordering::Acquire)
            && self.shared.primary.connected.load(Ordering::Relaxed)
    }

    fn is_connecting(&self) -> bool {
        self.shared.connecting.load(Ordering::Relaxed) > 0
    }

    fn servers(&self) -> Vec<ServerInfo> {
        self.shared.nodes().map(|n| n.info()).collect()
    }

    fn status(&self) -> String {
        let mut lines = vec![format!(
            "{}: {} operations",
            self.client_name(),
            self.operation_count()
        )];
        for server in self.servers() {
            lines.push(format!(
                "{:<7} {} {}",
                server.role,
                server.endpoint,
                if server.connected { "connected" } else { "disconnected" }
            ));
        }
        lines.extend(self.shared.stats.render_summary_lines());
        lines.join("\n")
    }

    fn add_event_handler(&self, handler: EventHandler) -> HandlerId {
        self.shared.events.add(handler)
    }

    fn remove_event_handler(&self, id: HandlerId) -> bool {
        self.shared.events.remove(id)
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.shared.closed.store(true, Ordering::Release);
            for node in self.shared.nodes() {
                let mut slot = node.slot.lock().await;
                if let Some(mut conn) = slot.take() {
                    // Best-effort shutdown.
                    let _ = conn.stream.shutdown().await;
                }
                node.connected.store(false, Ordering::Relaxed);
            }
            tracing::info!("multiplexer closed");
            Ok(())
        })
    }
}

/// Database handle of a [`RespMultiplexer`].
pub struct RespDatabase {
    shared: Arc<Shared>,
    db: Option<u32>,
}

fn cmd(name: &'static str) -> Bytes {
    Bytes::from_static(name.as_bytes())
}

fn script_parts(
    command: &'static str,
    script: &str,
    keys: &[RedisKey],
    values: &[RedisValue],
) -> Vec<Bytes> {
    let mut parts = Vec::with_capacity(3 + keys.len() + values.len());
    parts.push(cmd(command));
    parts.push(Bytes::copy_from_slice(script.as_bytes()));
    parts.push(Bytes::from(keys.len().to_string()));
    parts.extend(keys.iter().map(RedisKey::to_bytes));
    parts.extend(values.iter().cloned());
    parts
}

impl RespDatabase {
    async fn run(&self, parts: Vec<Bytes>, flags: CommandFlags) -> Result<RedisResult> {
        self.shared.execute(self.db, parts, flags).await
    }
}

impl Database for RespDatabase {
    fn index(&self) -> Option<u32> {
        self.db
    }

    fn hash_get<'a>(
        &'a self,
        key: &'a RedisKey,
        field: &'a RedisValue,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Option<RedisValue>>> {
        Box::pin(async move {
            self.run(vec![cmd("HGET"), key.to_bytes(), field.clone()], flags)
                .await?
                .into_value()
        })
    }

    fn hash_get_many<'a>(
        &'a self,
        key: &'a RedisKey,
        fields: &'a [RedisValue],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Vec<Option<RedisValue>>>> {
        Box::pin(async move {
            if fields.is_empty() {
                return Ok(Vec::new());
            }
            let mut parts = Vec::with_capacity(2 + fields.len());
            parts.push(cmd("HMGET"));
            parts.push(key.to_bytes());
            parts.extend(fields.iter().cloned());
            self.run(parts, flags)
                .await?
                .into_array()?
                .into_iter()
                .map(RedisResult::into_value)
                .collect()
        })
    }

    fn hash_set<'a>(
        &'a self,
        key: &'a RedisKey,
        field: &'a RedisValue,
        value: &'a RedisValue,
        when: When,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let name = match when {
                When::Always => "HSET",
                When::NotExists => "HSETNX",
                When::Exists => {
                    return Err(Error::Unsupported("hash set with When::Exists".to_string()));
                }
            };
            self.run(vec![cmd(name), key.to_bytes(), field.clone(), value.clone()], flags)
                .await?
                .into_bool()
        })
    }

    fn hash_set_many<'a>(
        &'a self,
        key: &'a RedisKey,
        entries: &'a [HashEntry],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if entries.is_empty() {
                return Ok(());
            }
            let mut parts = Vec::with_capacity(2 + entries.len() * 2);
            parts.push(cmd("HSET"));
            parts.push(key.to_bytes());
            for entry in entries {
                parts.push(entry.name.clone());
                parts.push(entry.value.clone());
            }
            self.run(parts, flags).await?;
            Ok(())
        })
    }

    fn script_evaluate<'a>(
        &'a self,
        script: &'a str,
        keys: &'a [RedisKey],
        values: &'a [RedisValue],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<RedisResult>> {
        Box::pin(self.run(script_parts("EVAL", script, keys, values), flags))
    }

    fn script_evaluate_sha<'a>(
        &'a self,
        sha1: &'a str,
        keys: &'a [RedisKey],
        values: &'a [RedisValue],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<RedisResult>> {
        Box::pin(self.run(script_parts("EVALSHA", sha1, keys, values), flags))
    }

    fn hash_get_all<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Vec<HashEntry>>> {
        Box::pin(async move {
            let items = self
                .run(vec![cmd("HGETALL"), key.to_bytes()], flags)
                .await?
                .into_array()?;
            let mut entries = Vec::with_capacity(items.len() / 2);
            let mut it = items.into_iter();
            while let (Some(name), Some(value)) = (it.next(), it.next()) {
                entries.push(HashEntry {
                    name: name.into_value()?.unwrap_or_default(),
                    value: value.into_value()?.unwrap_or_default(),
                });
            }
            Ok(entries)
        })
    }

    fn hash_delete<'a>(
        &'a self,
        key: &'a RedisKey,
        field: &'a RedisValue,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.run(vec![cmd("HDEL"), key.to_bytes(), field.clone()], flags)
                .await?
                .into_bool()
        })
    }

    fn hash_length<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            let n = self
                .run(vec![cmd("HLEN"), key.to_bytes()], flags)
                .await?
                .into_integer()?;
            Ok(u64::try_from(n).unwrap_or(0))
        })
    }

    fn string_get<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Option<RedisValue>>> {
        Box::pin(async move {
            self.run(vec![cmd("GET"), key.to_bytes()], flags)
                .await?
                .into_value()
        })
    }

    fn string_set<'a>(
        &'a self,
        key: &'a RedisKey,
        value: &'a RedisValue,
        expiry: Option<Duration>,
        when: When,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let mut parts = vec![cmd("SET"), key.to_bytes(), value.clone()];
            if let Some(expiry) = expiry {
                parts.push(cmd("PX"));
                parts.push(Bytes::from(expiry.as_millis().to_string()));
            }
            match when {
                When::Always => {}
                When::Exists => parts.push(cmd("XX")),
                When::NotExists => parts.push(cmd("NX")),
            }
            self.run(parts, flags).await?.into_bool()
        })
    }

    fn key_delete<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.run(vec![cmd("DEL"), key.to_bytes()], flags)
                .await?
                .into_bool()
        })
    }

    fn key_exists<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            self.run(vec![cmd("EXISTS"), key.to_bytes()], flags)
                .await?
                .into_bool()
        })
    }

    fn key_expire<'a>(
        &'a self,
        key: &'a RedisKey,
        expiry: Option<Duration>,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let parts = match expiry {
                Some(expiry) => vec![
                    cmd("PEXPIRE"),
                    key.to_bytes(),
                    Bytes::from(expiry.as_millis().to_string()),
                ],
                None => vec![cmd("PERSIST"), key.to_bytes()],
            };
            self.run(parts, flags).await?.into_bool()
        })
    }

    fn key_ttl<'a>(
        &'a self,
        key: &'a RedisKey,
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<Option<Duration>>> {
        Box::pin(async move {
            // -2: no such key, -1: no expiry. Nil only comes back for
            // fire-and-forget, where the reply is never read.
            let reply = self.run(vec![cmd("PTTL"), key.to_bytes()], flags).await?;
            if reply.is_nil() {
                return Ok(None);
            }
            let ms = reply.into_integer()?;
            Ok(u64::try_from(ms).ok().map(Duration::from_millis))
        })
    }

    fn ping<'a>(&'a self, flags: CommandFlags) -> BoxFuture<'a, Result<Duration>> {
        Box::pin(async move {
            let started = Instant::now();
            self.run(vec![cmd("PING")], flags).await?;
            Ok(started.elapsed())
        })
    }

    fn execute<'a>(
        &'a self,
        command: &'a str,
        args: &'a [Bytes],
        flags: CommandFlags,
    ) -> BoxFuture<'a, Result<RedisResult>> {
        Box::pin(async move {
            let mut parts = Vec::with_capacity(1 + args.len());
            parts.push(Bytes::copy_from_slice(command.as_bytes()));
            parts.extend(args.iter().cloned());
            self.run(parts, flags).await
        })
    }
}
