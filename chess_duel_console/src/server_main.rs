// The transport side of the server. Every connection gets two halves:
//   - a reader task that turns websocket frames into `IncomingEvent`s;
//   - a writer loop that drains the connection's outgoing channel.
// Both feed a single `ServerState` thread, which is the only place the session is touched.

use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use async_std::net::{TcpListener, TcpStream};
use chess_duel::event::ServerEvent;
use chess_duel::registry::ConnectionId;
use chess_duel::rules::{ChessRulesEngine, RulesEngine};
use chess_duel::server::*;
use chess_duel::side::Side;
use futures_util::StreamExt;
use log::{error, info, warn};
use prometheus::Encoder;
use tide::StatusCode;
use tide_jsx::html;

use crate::network::{self, CommunicationError};
use crate::server_config::ServerConfig;


// Lets writer loops flush the shutdown notice before the process exits.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_millis(200);

async fn handle_connection(
    peer_addr: String, stream: TcpStream, tx: mpsc::SyncSender<IncomingEvent>,
) -> anyhow::Result<()> {
    let stream = async_tungstenite::accept_async(stream)
        .await
        .with_context(|| format!("Websocket handshake with {peer_addr} failed"))?;
    let (mut stream_tx, mut stream_rx) = stream.split();

    let id = ConnectionId::new_unique();
    let (client_tx, client_rx) = async_std::channel::unbounded();
    // Sent before the reader starts, so the session sees the connect before any message.
    tx.send(IncomingEvent::Connect {
        id,
        events_tx: client_tx,
        logging_id: peer_addr.clone(),
    })
    .context("Server state is gone")?;

    // Client -> Server
    let reader_tx = tx.clone();
    async_std::task::spawn(async move {
        loop {
            match network::read_obj_async(&mut stream_rx).await {
                Ok(ev) => {
                    if reader_tx.send(IncomingEvent::Network(id, ev)).is_err() {
                        break;
                    }
                }
                Err(err) if err.is_recoverable() => {
                    warn!("Ignoring bad message from client {}: {:?}", peer_addr, err);
                }
                Err(err) => {
                    match err {
                        CommunicationError::ConnectionClosed => {}
                        err => warn!("Client {} read error: {:?}", peer_addr, err),
                    }
                    let _ = reader_tx.send(IncomingEvent::Disconnect(id));
                    break;
                }
            }
        }
    });

    // Server -> Client. Ends when the server drops the client or the socket fails.
    while let Ok(ev) = client_rx.recv().await {
        if let Err(err) = network::write_obj_async::<ServerEvent, _>(&mut stream_tx, &ev).await {
            warn!("Client {:?} write error: {:?}", id, err);
            let _ = tx.send(IncomingEvent::Disconnect(id));
            break;
        }
    }
    Ok(())
}

async fn run_websocket_listener(
    port: u16, tx: mpsc::SyncSender<IncomingEvent>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Cannot listen on port {port}"))?;
    info!("Listening to connections on {}...", listener.local_addr()?);
    let mut incoming = listener.incoming();
    while let Some(stream) = incoming.next().await {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!("Cannot establish connection: {}", err);
                continue;
            }
        };
        let peer_addr = stream
            .peer_addr()
            .map_or_else(|_| "<unknown>".to_owned(), |addr| addr.to_string());
        let tx = tx.clone();
        async_std::task::spawn(async move {
            if let Err(err) = handle_connection(peer_addr, stream, tx).await {
                warn!("{:#}", err);
            }
        });
    }
    Ok(())
}

fn make_status_server(
    server_info: Arc<Mutex<ServerInfo>>, static_content_dir: Option<&str>,
) -> anyhow::Result<tide::Server<Arc<Mutex<ServerInfo>>>> {
    let mut app = tide::with_state(server_info);
    app.with(tide::utils::After(|mut res: tide::Response| async {
        if let Some(err) = res.error() {
            let msg = format!("Error: {:#?}", err);
            res.set_status(err.status());
            res.set_body(msg);
        }
        Ok(res)
    }));
    app.at("/dyn/metrics").get(handle_metrics);
    app.at("/dyn/server").get(handle_server_info);
    if let Some(dir) = static_content_dir {
        app.at("/").serve_dir(dir).with_context(|| format!("Cannot serve '{dir}'"))?;
        app.at("/")
            .serve_file(format!("{dir}/index.html"))
            .with_context(|| format!("Cannot serve index.html from '{dir}'"))?;
    }
    Ok(app)
}

async fn handle_metrics(_req: tide::Request<Arc<Mutex<ServerInfo>>>) -> tide::Result {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    let mut resp = tide::Response::new(StatusCode::Ok);
    resp.set_body(String::from_utf8(buffer)?);
    Ok(resp)
}

async fn handle_server_info(req: tide::Request<Arc<Mutex<ServerInfo>>>) -> tide::Result {
    let info = req
        .state()
        .lock()
        .map_err(|_| tide::Error::from_str(StatusCode::InternalServerError, "Poisoned lock"))?
        .clone();
    let seat = |side: Side| if info.seats_taken[side] { "taken" } else { "free" };
    let status = format!("{:?}", info.status);
    let white_seat = seat(Side::White);
    let black_seat = seat(Side::Black);
    let num_connections = info.num_connections;
    let num_spectators = info.num_spectators;
    let board_state = info.board_state;
    let h: String = html! {
        <html>
        <head>
        </head>
        <body>
            <p>{"Session: "}{status}</p>
            <p>{"White seat: "}{white_seat}</p>
            <p>{"Black seat: "}{black_seat}</p>
            <p>{"Connections: "}{num_connections}</p>
            <p>{"Spectators: "}{num_spectators}</p>
            <p>{"Position: "}<code>{board_state}</code></p>
        </body>
        </html>
    };
    let mut resp = tide::Response::new(StatusCode::Ok);
    resp.set_content_type(tide::http::Mime::from("text/html; charset=UTF-8"));
    resp.set_body(h);
    Ok(resp)
}

fn make_rules(config: &ServerConfig) -> anyhow::Result<ChessRulesEngine> {
    let Some(source) = &config.starting_position else {
        return Ok(ChessRulesEngine::new());
    };
    let fen = source.get()?;
    ChessRulesEngine::with_starting_position(&fen).map_err(anyhow::Error::msg)
}

pub fn run(config: ServerConfig) -> anyhow::Result<()> {
    let rules = make_rules(&config).context("Bad starting position")?;
    info!("Starting position: {}", rules.serialize(&rules.initial_position()));

    // Limited buffer for data streaming from clients into the server.
    // When this is full because ServerState::apply_event isn't coping with
    // the load, we start putting back pressure on client websockets.
    let (tx, rx) = mpsc::sync_channel(100000);
    let tx_terminate = tx.clone();
    let server_info = Arc::new(Mutex::new(ServerInfo::new()));
    let server_info_copy = Arc::clone(&server_info);

    ctrlc::set_handler(move || {
        let _ = tx_terminate.send(IncomingEvent::Terminate);
    })
    .context("Error setting Ctrl-C handler")?;

    thread::spawn(move || {
        let mut server_state = ServerState::new(rules, server_info_copy);
        for event in rx {
            server_state.apply_event(event);
            if server_state.is_shutting_down() {
                thread::sleep(SHUTDOWN_GRACE_PERIOD);
                std::process::exit(0);
            }
        }
        error!("Unexpected end of events stream");
        std::process::exit(1);
    });

    if let Some(status_port) = config.status_port {
        let app = make_status_server(server_info, config.static_content_dir.as_deref())?;
        async_std::task::spawn(async move {
            if let Err(err) = app.listen(format!("0.0.0.0:{status_port}")).await {
                error!("Status server failed: {}", err);
            }
        });
    }

    async_std::task::block_on(run_websocket_listener(config.port, tx))
}
