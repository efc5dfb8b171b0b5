use std::path::Path;

use macroquad::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_chacha::rand_core::SeedableRng;

use pursuit::agent::Agent;
use pursuit::config::{Config, DEFAULT_CONFIG_PATH};
use pursuit::{Action, Outcome, Position, Session};

const INFO_AREA_HEIGHT: f32 = 60.0;
const CELL_SIZE: i32 = 80;
const MESSAGE_TEXT_SIZE: f32 = 24.0;
const BACKGROUND: Color = Color::new(0.55, 0.16, 0.16, 1.0);
const INFO_BACKGROUND: Color = Color::new(0.67, 0.24, 0.24, 1.0);
const EXIT_COLOR: Color = Color::new(0.39, 0.78, 0.39, 1.0);
const RUNNER_COLOR: Color = Color::new(0.2, 0.59, 1.0, 1.0);
const CHASER_COLOR: Color = Color::new(1.0, 0.39, 0.2, 1.0);

fn load_config() -> Config {
    match Config::load_or_default(Path::new(DEFAULT_CONFIG_PATH)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

fn window_conf() -> Conf {
    let size = load_config().grid.size;
    Conf {
        window_title: format!("pursuit - {}x{}", size, size),
        window_width: size * CELL_SIZE,
        window_height: size * CELL_SIZE + INFO_AREA_HEIGHT as i32,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut rng = ChaCha8Rng::from_rng(&mut ::rand::rng());

    let config = load_config();
    let agent = match Agent::load(&config, &config.play.brain_path) {
        Ok(agent) => agent,
        Err(e) if e.is_not_found() => {
            log::warn!("{}; training a new one", e);

            // show the notice before the long synchronous run
            clear_background(BACKGROUND);
            draw_info_area();
            draw_message("Chaser brain not found. Training... (this may take a few minutes)", ORANGE);
            next_frame().await;

            match Agent::train_and_store(&config, &mut rng) {
                Ok(agent) => agent,
                Err(e) => {
                    log::error!("could not train and save brain: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let mut session = Session::new(agent);
    let mut think_timer: f32 = 0.0; // seconds

    loop {
        if session.runner_to_move() {
            if let Some(action) = read_direction() {
                session.runner_move(action);
                think_timer = 0.0;
            }
        } else if session.chaser_to_move() {
            think_timer += get_frame_time();
            if think_timer >= config.play.think_delay {
                session.chaser_move(&mut rng);
            }
        }

        clear_background(BACKGROUND);
        draw_board(&session);
        draw_info_area();

        match session.outcome() {
            Outcome::InProgress if session.runner_to_move() => {
                draw_message("YOUR TURN (Runner). Use arrow keys or W, A, S, D.", WHITE);
            }
            Outcome::InProgress => draw_message("Chaser is thinking...", YELLOW),
            Outcome::ChaserWon => {
                draw_message("Game over.", WHITE);
                if draw_winner("CAUGHT! The chaser wins.") {
                    session.reset();
                }
            }
            Outcome::RunnerWon => {
                draw_message("Game over.", WHITE);
                if draw_winner("YOU ESCAPED!") {
                    session.reset();
                }
            }
        }

        next_frame().await
    }
}

struct Button {
    rect: Rect,
    text: &'static str,
}

impl Button {
    fn new(x: f32, y: f32, w: f32, h: f32, text: &'static str) -> Self {
        Self {
            rect: Rect::new(x, y, w, h),
            text,
        }
    }

    fn draw_and_check_click(&self) -> bool {
        let mouse_pos = mouse_position();
        let mouse_over = self.rect.contains(vec2(mouse_pos.0, mouse_pos.1));

        let color = if mouse_over {
            Color::from_rgba(0, 120, 0, 255) // darker on hover
        } else {
            Color::from_rgba(0, 150, 0, 255)
        };

        draw_rectangle(self.rect.x, self.rect.y, self.rect.w, self.rect.h, color);
        let text_dims = measure_text(self.text, None, 30, 1.0);
        let text_x = self.rect.x + (self.rect.w - text_dims.width) / 2.0;
        let text_y = self.rect.y + (self.rect.h - text_dims.height) / 2.0 + text_dims.offset_y;
        draw_text(self.text, text_x, text_y, 30.0, WHITE);
        mouse_over && is_mouse_button_pressed(MouseButton::Left)
    }
}

fn board_area() -> Rect {
    Rect::new(0.0, 0.0, screen_width(), screen_height() - INFO_AREA_HEIGHT)
}

fn cell_rect(area: Rect, cells: i32, position: Position) -> Rect {
    let cell_width = area.w / cells as f32;
    let cell_height = area.h / cells as f32;
    Rect::new(
        area.x + position.col as f32 * cell_width,
        area.y + position.row as f32 * cell_height,
        cell_width,
        cell_height,
    )
}

fn draw_board(session: &Session) {
    let grid = session.agent().game().grid();
    let cells = grid.size();
    let area = board_area();
    let grid_line_color = Color::new(0.6, 0.6, 0.6, 1.0);

    // exit
    let exit = cell_rect(area, cells, grid.exit());
    draw_rectangle(exit.x, exit.y, exit.w, exit.h, EXIT_COLOR);
    let exit_dims = measure_text("EXIT", None, 20, 1.0);
    draw_text(
        "EXIT",
        exit.x + (exit.w - exit_dims.width) / 2.0,
        exit.y + exit.h - 8.0,
        20.0,
        WHITE,
    );

    for i in 1..cells {
        let x = area.x + i as f32 * area.w / cells as f32;
        draw_line(x, area.y, x, area.y + area.h, 1.0, grid_line_color);

        let y = area.y + i as f32 * area.h / cells as f32;
        draw_line(area.x, y, area.x + area.w, y, 1.0, grid_line_color);
    }

    let state = session.state();
    draw_piece(cell_rect(area, cells, state.chaser), CHASER_COLOR, "C");
    draw_piece(cell_rect(area, cells, state.runner), RUNNER_COLOR, "R");
}

fn draw_piece(cell: Rect, color: Color, label: &str) {
    let center = cell.center();
    let radius = cell.w.min(cell.h) / 2.0 - 10.0;
    draw_circle(center.x, center.y, radius, color);

    let dims = measure_text(label, None, 36, 1.0);
    draw_text(label, center.x - dims.width / 2.0, center.y + dims.offset_y / 2.0, 36.0, WHITE);
}

fn draw_info_area() {
    let info = Rect::new(0.0, screen_height() - INFO_AREA_HEIGHT, screen_width(), INFO_AREA_HEIGHT);
    draw_rectangle(info.x, info.y, info.w, info.h, INFO_BACKGROUND);
}

fn draw_message(message: &str, color: Color) {
    draw_text(message, 10.0, screen_height() - INFO_AREA_HEIGHT / 2.0 + 8.0, MESSAGE_TEXT_SIZE, color);
}

// dims the board, shows the result and a play-again button; true when clicked
fn draw_winner(message: &str) -> bool {
    let area = board_area();
    draw_rectangle(area.x, area.y, area.w, area.h, Color::new(0.0, 0.0, 0.0, 0.7));

    let dims = measure_text(message, None, 40, 1.0);
    draw_text(
        message,
        area.w / 2.0 - dims.width / 2.0,
        area.h / 2.0,
        40.0,
        WHITE,
    );

    let play_again = Button::new(area.w / 2.0 - 100.0, area.h / 2.0 + 30.0, 200.0, 50.0, "PLAY AGAIN");
    play_again.draw_and_check_click()
}

fn read_direction() -> Option<Action> {
    // use WASD or arrow keys for input
    if is_key_pressed(KeyCode::Up) || is_key_pressed(KeyCode::W) {
        Some(Action::Up)
    } else if is_key_pressed(KeyCode::Down) || is_key_pressed(KeyCode::S) {
        Some(Action::Down)
    } else if is_key_pressed(KeyCode::Right) || is_key_pressed(KeyCode::D) {
        Some(Action::Right)
    } else if is_key_pressed(KeyCode::Left) || is_key_pressed(KeyCode::A) {
        Some(Action::Left)
    } else if is_key_pressed(KeyCode::Space) {
        Some(Action::Stay)
    } else {
        None
    }
}
