use macroquad::prelude::*;

use snake_vision::death::DeathAnimation;
use snake_vision::game::Game;
use snake_vision::store::HighScoreStore;
use snake_vision::{Cell, GameState, Grid};

// Matrix-style palette
const MATRIX_HEAD: Color = Color::new(0.64, 1.0, 0.64, 1.0); // bright green
const MATRIX_BODY: Color = Color::new(0.25, 0.9, 0.25, 1.0); // medium green
const MATRIX_GRID: Color = Color::new(0.0, 0.07, 0.0, 1.0); // barely there
const MATRIX_FOOD: Color = Color::new(1.0, 1.0, 0.0, 1.0);
pub const HUD_HEIGHT: f32 = 72.0;
const FLASH_FRAMES: u32 = 15;

const MATRIX_GLYPHS: &[u8] = b"01<>[]{}()/\\|-=+*;:.,^~ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn matrix_char_for_cell(c: Cell) -> char {
    let hx = (c.x as i64).wrapping_mul(73_856_093);
    let hy = (c.y as i64).wrapping_mul(19_349_663);
    let h = (hx ^ hy).unsigned_abs() as usize;
    MATRIX_GLYPHS[h % MATRIX_GLYPHS.len()] as char
}

/// Where the board sits on screen.
#[derive(Copy, Clone)]
pub struct Layout {
    tile: f32,
    off_x: f32,
    off_y: f32,
    width: f32,
    height: f32,
}

impl Layout {
    pub fn fit(grid: Grid) -> Self {
        let sw = screen_width();
        let sh = screen_height() - HUD_HEIGHT;
        let tile = (sw / grid.width as f32).min(sh / grid.height as f32).max(1.0);
        let width = tile * grid.width as f32;
        let height = tile * grid.height as f32;
        Self { tile, off_x: (sw - width) * 0.5, off_y: HUD_HEIGHT + (sh - height) * 0.5, width, height }
    }

    fn shifted(self, dx: f32, dy: f32) -> Self {
        Self { off_x: self.off_x + dx, off_y: self.off_y + dy, ..self }
    }

    fn cell_rect(&self, c: Cell, inset: f32) -> Rect {
        Rect::new(
            self.off_x + c.x as f32 * self.tile + inset,
            self.off_y + c.y as f32 * self.tile + inset,
            self.tile - inset * 2.0,
            self.tile - inset * 2.0,
        )
    }
}

fn draw_glyph_at_cell(ch: char, cell: Cell, color: Color, layout: &Layout) {
    let x = layout.off_x + cell.x as f32 * layout.tile + layout.tile * 0.2;
    let y = layout.off_y + (cell.y as f32 + 1.0) * layout.tile - layout.tile * 0.2; // baseline
    let params = TextParams {
        font_size: layout.tile.max(6.0) as u16,
        font_scale: 1.0,
        font_scale_aspect: 1.0,
        color,
        ..Default::default()
    };
    draw_text_ex(&ch.to_string(), x, y, params);
}

fn draw_grid_lines(grid: Grid, layout: &Layout) {
    for x in 0..=grid.width {
        let px = layout.off_x + x as f32 * layout.tile;
        draw_line(px, layout.off_y, px, layout.off_y + layout.height, 1.0, MATRIX_GRID);
    }
    for y in 0..=grid.height {
        let py = layout.off_y + y as f32 * layout.tile;
        draw_line(layout.off_x, py, layout.off_x + layout.width, py, 1.0, MATRIX_GRID);
    }
    draw_rectangle_lines(layout.off_x - 2.0, layout.off_y - 2.0, layout.width + 4.0, layout.height + 4.0, 2.0, MATRIX_BODY);
}

fn draw_snake<'a>(cells: impl Iterator<Item = &'a Cell>, layout: &Layout) {
    for (i, c) in cells.enumerate() {
        if i == 0 {
            let r = layout.cell_rect(*c, 1.0);
            draw_rectangle(r.x, r.y, r.w, r.h, MATRIX_HEAD);
            draw_glyph_at_cell(matrix_char_for_cell(*c), *c, BLACK, layout);
        } else {
            let r = layout.cell_rect(*c, layout.tile * 0.1);
            draw_rectangle(r.x, r.y, r.w, r.h, Color::new(MATRIX_BODY.r, MATRIX_BODY.g, MATRIX_BODY.b, 0.35));
            draw_glyph_at_cell(matrix_char_for_cell(*c), *c, MATRIX_BODY, layout);
        }
    }
}

fn draw_food(food: Cell, layout: &Layout) {
    let glow = layout.cell_rect(food, 0.0);
    draw_rectangle(glow.x, glow.y, glow.w, glow.h, Color::new(1.0, 1.0, 0.0, 0.15));
    let r = layout.cell_rect(food, layout.tile * 0.15);
    draw_rectangle(r.x, r.y, r.w, r.h, MATRIX_FOOD);
}

fn draw_death(anim: &DeathAnimation, layout: &Layout) {
    if anim.frame < FLASH_FRAMES {
        let alpha = (0.6 - anim.frame as f32 * 0.04).max(0.0);
        draw_rectangle(layout.off_x, layout.off_y, layout.width, layout.height, Color::new(1.0, 0.0, 0.0, alpha));
    }
    for p in anim.live_particles() {
        let size = (4.0 * p.life).max(1.0) * layout.tile / 20.0;
        let x = layout.off_x + p.x * layout.tile;
        let y = layout.off_y + p.y * layout.tile;
        draw_rectangle(x - size * 0.5, y - size * 0.5, size, size, Color::new(1.0, p.life, 0.0, p.life));
    }
}

fn centered(text: &str, y: f32, size: f32, color: Color) {
    let m = measure_text(text, None, size as u16, 1.0);
    draw_text(text, (screen_width() - m.width) * 0.5, y, size, color);
}

fn draw_overlay(lines: &[(&str, f32, Color)], layout: &Layout) {
    draw_rectangle(layout.off_x, layout.off_y, layout.width, layout.height, Color::new(0.0, 0.0, 0.0, 0.85));
    let total: f32 = lines.iter().map(|(_, size, _)| size + 8.0).sum();
    let mut y = layout.off_y + (layout.height - total) * 0.5;
    for (text, size, color) in lines {
        y += size + 8.0;
        centered(text, y, *size, *color);
    }
}

fn draw_hud<S: HighScoreStore>(game: &Game<S>, backend: &str) {
    draw_text(&format!("SCORE: {:06}", game.displayed_score()), 8.0, 22.0, 24.0, MATRIX_BODY);
    let high = format!("HIGH: {:06}", game.high_score());
    let m = measure_text(&high, None, 24, 1.0);
    draw_text(&high, screen_width() - m.width - 8.0, 22.0, 24.0, MATRIX_BODY);

    let vision = if game.vision_enabled() { "on" } else { "off" };
    let status = match game.replay_status() {
        Some(r) => format!("REPLAY {} / {}  speed {}", r.position, r.len, r.speed.label()),
        None => format!("vision {vision} ({backend})"),
    };
    draw_text(&status, 8.0, 48.0, 18.0, GRAY);
}

pub fn draw<S: HighScoreStore>(game: &Game<S>, backend: &str) {
    let grid = game.board().grid;
    let mut layout = Layout::fit(grid);

    if let Some(anim) = game.death() {
        let shake = anim.remaining() * 5.0;
        if shake > 0.0 {
            layout = layout.shifted(
                macroquad::rand::gen_range(-shake, shake) * 0.5,
                macroquad::rand::gen_range(-shake, shake) * 0.5,
            );
        }
    }

    draw_grid_lines(grid, &layout);
    match game.replay_frame() {
        Some(frame) => {
            draw_snake(frame.snake.iter(), &layout);
            draw_food(frame.food, &layout);
        }
        None => {
            draw_snake(game.snake().iter(), &layout);
            draw_food(game.food(), &layout);
        }
    }
    if let Some(anim) = game.death() {
        draw_death(anim, &layout);
    }

    draw_hud(game, backend);

    let final_score = format!("Final Score: {}", game.score());
    let best = format!("High Score: {}", game.high_score());
    match game.state() {
        GameState::Menu => draw_overlay(
            &[
                ("SNAKE CV", 40.0, MATRIX_HEAD),
                ("Arrows/WASD to move, or enable vision (V)", 18.0, GRAY),
                ("M: detection mode   -/=: sensitivity", 16.0, GRAY),
                ("Enter: Start   Q: Quit", 20.0, WHITE),
            ],
            &layout,
        ),
        GameState::Paused => draw_overlay(
            &[("PAUSED", 36.0, MATRIX_HEAD), ("Space to continue", 18.0, GRAY)],
            &layout,
        ),
        GameState::GameOver => {
            let mut lines = vec![
                ("GAME OVER", 36.0, RED),
                (final_score.as_str(), 22.0, MATRIX_FOOD),
                (best.as_str(), 18.0, MATRIX_BODY),
            ];
            if game.is_new_high_score() {
                lines.push(("NEW HIGH SCORE!", 20.0, MATRIX_FOOD));
            }
            let replay_hint = if game.log().is_empty() { "" } else { "R: Replay  " };
            let hint = format!("Enter: Play again  {replay_hint}Esc: Menu");
            lines.push((hint.as_str(), 18.0, WHITE));
            draw_overlay(&lines, &layout);
        }
        GameState::Replay => {
            centered("<-/-> step   Up/Down: 10 frames   1/2/3 speed   Esc: back", screen_height() - 8.0, 16.0, GRAY);
        }
        GameState::Playing | GameState::DeathAnimation => {}
    }
}
