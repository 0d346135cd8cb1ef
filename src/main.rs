use std::path::PathBuf;
use std::time::Duration;

use macroquad::prelude::*;
use tracing::warn;

use snake_vision::config::{DEFAULT_CONFIG_PATH, GameConfig};
use snake_vision::game::Game;
use snake_vision::input::{WATCHED_KEYS, commands_for_key};
use snake_vision::store::JsonFileStore;

#[cfg(not(target_arch = "wasm32"))]
use snake_vision::backend::DetectionClient;

mod render;

fn window_conf() -> Conf {
    Conf {
        window_title: "Snake CV".to_owned(),
        window_width: 400,
        window_height: 472,
        high_dpi: true,
        ..Default::default()
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("snake_vision=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_config() -> GameConfig {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = GameConfig::load(&path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "falling back to default config");
        GameConfig::default()
    });
    if config.seed.is_none() {
        config.seed = Some((macroquad::miniquad::date::now() * 1_000_000.0) as u64);
    }
    config
}

#[macroquad::main(window_conf)]
async fn main() {
    #[cfg(not(target_arch = "wasm32"))]
    init_tracing();

    let config = load_config();
    let grid = config.grid();
    request_new_screen_size(
        grid.width as f32 * config.cell_size,
        grid.height as f32 * config.cell_size + render::HUD_HEIGHT,
    );
    let mut game = Game::new(&config, JsonFileStore::new(&config.save_path));

    #[cfg(not(target_arch = "wasm32"))]
    let mut backend_config = config.backend.clone();
    #[cfg(not(target_arch = "wasm32"))]
    let mut backend = backend_config.enabled.then(|| DetectionClient::connect(backend_config.clone()));

    loop {
        if is_key_pressed(KeyCode::Q) {
            break;
        }

        for &key in WATCHED_KEYS {
            if is_key_pressed(key) {
                for command in commands_for_key(key, game.state()) {
                    game.apply(command);
                }
            }
        }
        if is_key_pressed(KeyCode::V) {
            game.set_vision_enabled(!game.vision_enabled());
        }

        #[cfg(not(target_arch = "wasm32"))]
        let backend_label = {
            // B: try the backend again after it went away.
            if is_key_pressed(KeyCode::B) {
                backend = Some(DetectionClient::connect(backend_config.clone()));
            }
            if is_key_pressed(KeyCode::M) {
                backend_config.mode = backend_config.mode.next();
                if let Some(client) = &backend {
                    client.set_mode(backend_config.mode);
                }
            }
            let nudge = if is_key_pressed(KeyCode::Minus) {
                -10
            } else if is_key_pressed(KeyCode::Equal) {
                10
            } else {
                0
            };
            if nudge != 0 {
                let sensitivity = backend_config.nudge_sensitivity(nudge);
                if let Some(client) = &backend {
                    client.set_sensitivity(sensitivity);
                }
            }
            match &backend {
                Some(client) => {
                    while let Some(result) = client.try_recv() {
                        game.ingest_detection(result);
                    }
                    format!(
                        "{}, {} {}%",
                        client.status().label(),
                        backend_config.mode.as_str(),
                        backend_config.sensitivity
                    )
                }
                None => "backend disabled".to_owned(),
            }
        };
        #[cfg(target_arch = "wasm32")]
        let backend_label = String::from("keyboard only");

        game.update(Duration::from_secs_f32(get_frame_time().max(0.0)));

        clear_background(BLACK);
        render::draw(&game, &backend_label);

        next_frame().await;
    }
}
