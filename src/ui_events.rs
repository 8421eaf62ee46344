use crate::app_state::State;
use crate::config::SynapseOptions;
use crate::scheduler::Clock;

#[derive(Debug)]
pub enum UserCommand {
    /// Replace the widget options and start a fresh network.
    SetOptions(SynapseOptions),
    StateInitialized, // Notifies App that State setup is complete
}

impl State {
    pub fn process_command(&mut self, command: UserCommand) {
        match command {
            UserCommand::SetOptions(options) => {
                log::info!(
                    "Setting options: {} nodes, color {:?}, viewport sizing {}.",
                    options.network_size,
                    options.color,
                    options.viewport
                );
                let now = self.clock.now();
                self.synapse.reconfigure(options, now);
                self.update();
            }
            UserCommand::StateInitialized => {
                // This command is handled in App::user_event
            }
        }
    }
}
