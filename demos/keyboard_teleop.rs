// Keyboard teleop over the bus: W/S forward/back, A/D turn, space stop, Q quit
use carrito_runtime::config::{
    TOPIC_ADELANTE, TOPIC_ALTO, TOPIC_ATRAS, TOPIC_DERECHA, TOPIC_DISTANCIA, TOPIC_IZQUIERDA,
};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::Duration;
use tracing::info;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    // Echo what the vehicle reports back
    let _distance = session
        .declare_subscriber(TOPIC_DISTANCIA)
        .callback(|sample| {
            let text = String::from_utf8_lossy(&sample.payload().to_bytes()).into_owned();
            info!("{}", text);
        })
        .await?;

    info!("Controls: W/S=forward/back, A/D=left/right, space=stop, Q=quit");

    enable_raw_mode()?;
    let result = run_teleop(&session).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(session: &zenoh::Session) -> Result<(), BoxError> {
    loop {
        if !event::poll(Duration::from_millis(20))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }

        let topic = match code {
            KeyCode::Char('w') => TOPIC_ADELANTE,
            KeyCode::Char('s') => TOPIC_ATRAS,
            KeyCode::Char('a') => TOPIC_IZQUIERDA,
            KeyCode::Char('d') => TOPIC_DERECHA,
            KeyCode::Char(' ') => TOPIC_ALTO,
            KeyCode::Char('q') | KeyCode::Esc => {
                // leave the vehicle stopped
                session.put(TOPIC_ALTO, "1").await?;
                break;
            }
            _ => continue,
        };

        info!("-> {}", topic);
        // Payload is ignored by the runtime, only the topic matters
        session.put(topic, "1").await?;
    }

    Ok(())
}
