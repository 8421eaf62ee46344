use std::{sync::Arc, sync::Mutex};
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::Window,
};
#[cfg(not(target_arch = "wasm32"))]
use winit::keyboard::{Key, NamedKey};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;
#[cfg(target_arch = "wasm32")]
use once_cell::sync::OnceCell;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen_futures::future_to_promise;
#[cfg(target_arch = "wasm32")]
use js_sys::Promise;
use winit::event_loop::EventLoopProxy;

pub mod canvas;
pub mod color;
pub mod config;
pub mod error;
pub mod models;
pub mod scene;
pub mod scheduler;
pub mod synapse;
mod app_state;
mod ui_events;

pub use canvas::{Canvas, DrawCommand, LineCanvas, RecordingCanvas};
pub use color::{ColorCoords, DeviceColor, parse_color, resolve_color};
pub use config::SynapseOptions;
pub use error::{SynapseError, SynapseResult};
pub use scheduler::{Clock, ManualClock, Scheduler, SystemClock, TaskHandle};
pub use synapse::{CYCLE_INTERVAL, FixedSize, Phase, SizeSource, SynapseBg};

use app_state::State;
use ui_events::UserCommand;

#[cfg(target_arch = "wasm32")]
static WASM_API_INSTANCE: OnceCell<WasmApi> = OnceCell::new();

#[cfg(target_arch = "wasm32")]
static WASM_READY_FLUME_CHANNEL: OnceCell<(flume::Sender<()>, flume::Receiver<()>)> = OnceCell::new();


struct App {
    window: Option<Arc<Window>>,
    state: Arc<Mutex<Option<State>>>, // Wrapped in Arc<Mutex> so the wasm init task can fill it in
    options: SynapseOptions,
    proxy: EventLoopProxy<UserCommand>,
}

impl App {
    fn new(options: SynapseOptions, event_loop: &EventLoop<UserCommand>) -> Self {
        let app_proxy = event_loop.create_proxy();

        #[cfg(target_arch = "wasm32")]
        {
            let wasm_api_instance = WasmApi { proxy: app_proxy.clone() };
            if WASM_API_INSTANCE.set(wasm_api_instance).is_err() {
                log::warn!("WASM_API_INSTANCE was already set. This should only happen once.");
            }
        }

        Self {
            window: None,
            state: Arc::new(Mutex::new(None)),
            options,
            proxy: app_proxy,
        }
    }
}

impl ApplicationHandler<UserCommand> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes()
            .with_title("synapse-bg")
            .with_transparent(true);

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "synapse-bg";

            let window = wgpu::web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        #[cfg(not(target_arch = "wasm32"))]
        {
            match pollster::block_on(State::new(window.clone(), self.options.clone())) {
                Ok(mut state) => {
                    let current_size = window.inner_size();
                    state.resize(current_size.width, current_size.height);
                    self.state.lock().unwrap().replace(state);
                    if self.proxy.send_event(UserCommand::StateInitialized).is_err() {
                        log::error!("Failed to send StateInitialized event.");
                    }
                }
                Err(e) => {
                    log::error!("Failed to create State: {:#}", e);
                    event_loop.exit();
                }
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let state_arc_for_spawn = self.state.clone();
            let window_for_state_new = window.clone();
            let options = self.options.clone();
            let proxy_for_init_notification = self.proxy.clone();

            wasm_bindgen_futures::spawn_local(async move {
                match State::new(window_for_state_new.clone(), options).await {
                    Ok(mut state_instance) => {
                        log::info!("WASM State created in async task.");
                        let initial_size = window_for_state_new.inner_size();
                        state_instance.resize(initial_size.width, initial_size.height);

                        {
                            let mut app_state_guard = state_arc_for_spawn.lock().unwrap();
                            app_state_guard.replace(state_instance);
                        }
                        log::info!("WASM State assigned to App. Sending initialization notification.");
                        if proxy_for_init_notification.send_event(UserCommand::StateInitialized).is_err() {
                            log::error!("Failed to send StateInitialized event.");
                        }
                    },
                    Err(e) => log::error!("Failed to create State in WASM: {:?}", e),
                }
            });
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserCommand) {
        match event {
            UserCommand::StateInitialized => {
                log::info!("State initialized and ready.");
                // Signal to the promise resolver
                #[cfg(target_arch = "wasm32")]
                if let Some((sender, _)) = WASM_READY_FLUME_CHANNEL.get() {
                    if let Err(e) = sender.send(()) {
                        log::error!("Failed to send WASM ready signal: {:?}", e);
                    }
                }
                if let Some(w_handle) = self.window.as_ref() {
                    w_handle.request_redraw();
                }
            }
            _ => {
                if let Some(state) = &mut *self.state.lock().unwrap() {
                    state.process_command(event);
                    if let Some(w_handle) = self.window.as_ref() {
                        w_handle.request_redraw();
                    }
                } else {
                    log::warn!("Received a command before state was initialized (via proxy). Ignoring: {:?}", event);
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut *self.state.lock().unwrap() else {
            log::warn!("Window event received before State was initialized, ignoring.");
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            #[cfg(not(target_arch = "wasm32"))]
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.logical_key == Key::Named(NamedKey::F5) =>
            {
                self.reload_options();
            }
            WindowEvent::Resized(size) => {
                state.resize(size.width, size.height);
                if let Some(w_handle) = self.window.as_ref() {
                    w_handle.request_redraw();
                }
            }
            WindowEvent::RedrawRequested => {
                match state.render() {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => state.resize(state.config.width, state.config.height),
                    Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                    Err(e) => log::error!("{:?}", e),
                }
            }
            _ => {}
        }
    }

    // Timers live in the orchestrator; sleep until the next one is due.
    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = &mut *self.state.lock().unwrap() else {
            return;
        };

        if state.update() {
            if let Some(w_handle) = self.window.as_ref() {
                w_handle.request_redraw();
            }
        }

        let control_flow = match state.time_until_next_deadline() {
            Some(wait) => ControlFlow::wait_duration(wait),
            None => ControlFlow::Wait,
        };
        event_loop.set_control_flow(control_flow);
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl App {
    /// Re-reads the options file and hands it to the running state.
    fn reload_options(&self) {
        match load_options() {
            Ok(options) => {
                if self.proxy.send_event(UserCommand::SetOptions(options)).is_err() {
                    log::error!("Failed to send SetOptions event.");
                }
            }
            Err(e) => log::error!("Keeping current options: {:#}", e),
        }
    }
}

/// Options file given as the first command line argument, or defaults.
#[cfg(not(target_arch = "wasm32"))]
fn load_options() -> anyhow::Result<SynapseOptions> {
    match std::env::args().nth(1) {
        Some(path) => read_options(std::path::Path::new(&path)),
        None => Ok(SynapseOptions::default()),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn read_options(path: &std::path::Path) -> anyhow::Result<SynapseOptions> {
    use anyhow::Context;

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading options file {}", path.display()))?;
    let options = SynapseOptions::from_json(&json)
        .with_context(|| format!("parsing options file {}", path.display()))?;
    log::info!("Loaded options from {}.", path.display());
    Ok(options)
}

pub fn run() -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    let options = {
        env_logger::init();
        load_options()?
    };
    #[cfg(target_arch = "wasm32")]
    let options = {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).unwrap_throw();
        log::info!("Starting synapse-bg.");
        let (sender, receiver) = flume::unbounded();
        WASM_READY_FLUME_CHANNEL.set((sender, receiver))
            .expect("Failed to initialize WASM_READY_CHANNEL. This should not happen.");
        log::info!("WASM ready channel created and stored.");
        // The page pushes real options through WasmApi::set_options.
        SynapseOptions::default()
    };

    let event_loop = EventLoop::with_user_event().build()?;
    let mut app = App::new(options, &event_loop);
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), wasm_bindgen::JsValue> {
    log::info!("WASM started: Calling run().");
    run().unwrap_throw();

    Ok(())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
#[derive(Clone, Debug)]
pub struct WasmApi {
    proxy: EventLoopProxy<UserCommand>,
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl WasmApi {
    /// Accepts `{"color", "networkSize", "speedScale", "tracerScale", "viewport"}`.
    #[wasm_bindgen(js_name = setOptions)]
    pub fn set_options(&self, options_json: &str) -> Result<(), JsValue> {
        let options = SynapseOptions::from_json(options_json)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        log::info!("Received SetOptions command from JS.");

        if self.proxy.send_event(UserCommand::SetOptions(options)).is_err() {
            return Err(JsValue::from_str("Failed to send command to event loop."));
        }
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = getWasmApi)]
pub fn get_wasm_api() -> Result<WasmApi, JsValue> {
    WASM_API_INSTANCE.get()
        .cloned()
        .ok_or_else(|| JsValue::from_str("WasmApi is not initialized. Call run_web() first."))
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(js_name = getWasmReadyPromise)]
pub fn get_wasm_ready_promise() -> Result<Promise, JsValue> {
    let (_, receiver) = WASM_READY_FLUME_CHANNEL.get()
        .ok_or_else(|| JsValue::from_str("WASM ready channel not initialized. Call run_web() first."))?;
    let receiver = receiver.clone();

    let ready_promise = future_to_promise(async move {
        receiver.recv_async().await.unwrap_throw();
        Ok(JsValue::NULL)
    });

    Ok(ready_promise)
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    fn write_options(name: &str, json: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("synapse-bg-{}-{name}.json", std::process::id()));
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn options_file_is_read_and_normalized() {
        let path = write_options("ok", r#"{"networkSize":0,"color":"tomato","viewport":true}"#);
        let options = read_options(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(options.network_size, config::DEFAULT_NETWORK_SIZE);
        assert_eq!(options.color.as_deref(), Some("tomato"));
        assert!(options.viewport);
    }

    #[test]
    fn bad_options_file_names_the_path() {
        let path = write_options("bad", "{networkSize");
        let err = read_options(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert!(format!("{err:#}").contains("parsing options file"));
        assert!(read_options(std::path::Path::new("/nonexistent/synapse-bg.json")).is_err());
    }
}
