//! Lane Rush entry point
//!
//! Headless demo runner: the core drives itself on autopilot, overlaps come
//! from the AABB stand-in, and overlays close on their own after a short
//! delay. Prints the final HUD snapshot as JSON.

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::cell::RefCell;
    use std::rc::Rc;

    use lane_rush::GameConfig;
    use lane_rush::consts::FRAME_MS;
    use lane_rush::sim::{Command, GameEvent, Run, TickInput, Viewport, detect_contacts};

    /// Ten minutes of frames
    const MAX_TICKS: u64 = 60 * 60 * 10;
    /// Frames an overlay stays up before the runner dismisses it
    const OVERLAY_TICKS: u32 = 90;

    /// Demo session wrapping a run
    pub struct Game {
        run: Run,
        inbox: Rc<RefCell<Vec<GameEvent>>>,
        overlay_countdown: Option<u32>,
        finished: bool,
    }

    impl Game {
        pub fn new(config: GameConfig, seed: u64) -> Self {
            let mut run = Run::new(config, Viewport::default(), seed);
            let inbox = Rc::new(RefCell::new(Vec::new()));
            let sink = inbox.clone();
            run.subscribe(move |event| sink.borrow_mut().push(event.clone()));
            Self {
                run,
                inbox,
                overlay_countdown: None,
                finished: false,
            }
        }

        /// One frame: tick, feed overlaps, react to events
        fn update(&mut self) {
            let input = TickInput {
                pointer_x: None,
                autopilot: true,
            };
            self.run.tick(&input, FRAME_MS);

            if !self.run.is_world_paused() {
                let contacts = detect_contacts(
                    self.run.vehicle(),
                    self.run.spawner().hazards(),
                    self.run.viewport(),
                    self.run.config(),
                );
                for contact in contacts {
                    self.run.on_contact(contact);
                }
            }

            let events: Vec<GameEvent> = self.inbox.borrow_mut().drain(..).collect();
            for event in events {
                match event {
                    GameEvent::CheckpointReached { item } => {
                        log::info!("Overlay: {}", item.as_str());
                        self.overlay_countdown = Some(OVERLAY_TICKS);
                    }
                    GameEvent::LivesChanged { max_lives, hits } => {
                        log::info!("Lives: {}/{}", max_lives.saturating_sub(hits), max_lives);
                    }
                    GameEvent::GoalReached | GameEvent::GameOver => {
                        log::info!("Run over: {:?}", event);
                        self.finished = true;
                    }
                    GameEvent::RunReset | GameEvent::CameraShake { .. } => {}
                }
            }

            if let Some(left) = self.overlay_countdown.take() {
                if left == 0 {
                    self.run.handle(Command::CheckpointOverlayClosed);
                } else {
                    self.overlay_countdown = Some(left - 1);
                }
            }
        }

        pub fn play(&mut self) -> &Run {
            let mut ticks = 0;
            while !self.finished && ticks < MAX_TICKS {
                self.update();
                ticks += 1;
            }
            if !self.finished {
                log::warn!("Stopped after {} ticks without finishing", ticks);
            }
            &self.run
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use lane_rush::GameConfig;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Lane Rush (headless) starting...");

    let config = match std::env::args().nth(1) {
        Some(path) => match GameConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => GameConfig::default(),
    };

    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let mut game = headless::Game::new(config, seed);
    let run = game.play();
    match serde_json::to_string_pretty(&run.snapshot()) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to serialize snapshot: {}", e),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The core is a library on the web; presentation lives in the host page
}
