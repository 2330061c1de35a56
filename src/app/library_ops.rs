//! Client and collection selection, item listing.

use tracing::{info, warn};

use crate::library::ItemStatus;
use crate::remote::TransferError;
use crate::ssh::ErrorClass;

use super::{App, Command, Mode, Msg, Panel, PendingAction};

impl App {
    /// Selects the client at `index` and moves focus to the consoles.
    pub(super) fn select_client(&mut self, index: usize) {
        let Some(name) = self.config.clients.get(index).map(|c| c.name.clone()) else {
            return;
        };
        info!("Selected client {}", name);
        self.selected_client = Some(name);
        self.selected_collection = None;
        self.items.clear();
        self.console_cursor = 0;
        self.panel = Panel::Consoles;
    }

    /// Selects the collection at `index` and lists its items.
    pub(super) fn select_collection(&mut self, index: usize) -> Vec<Command> {
        let Some(collection) = self.collections.get(index).cloned() else {
            return Vec::new();
        };
        if self.selected_client.is_none() {
            return self.set_error("Select a device first");
        }

        info!("Selected collection {}", collection.name);
        self.selected_collection = Some(collection);
        self.items.clear();
        self.panel = Panel::Roms;
        self.load_items()
    }

    /// Lists the selected collection, asking for a password first if needed.
    pub(super) fn load_items(&mut self) -> Vec<Command> {
        let (Some(client), Some(collection)) =
            (self.selected_client.clone(), self.selected_collection.clone())
        else {
            return Vec::new();
        };
        let Some(profile) = self.effective_profile(&client) else {
            return self.set_error(format!("Unknown client '{}'", client));
        };

        if self.needs_password(&profile) {
            return self.update(Msg::PasswordRequired {
                client,
                action: PendingAction::LoadItems,
            });
        }

        self.items.loading = true;
        let server_dir = self.config.server_collection_dir(&collection);
        let client_dir = profile.collection_dir(&collection);
        vec![Command::LoadItems {
            profile,
            collection,
            server_dir,
            client_dir,
        }]
    }

    fn is_current_listing(&self, client: &str, collection: &str) -> bool {
        self.selected_client.as_deref() == Some(client)
            && self
                .selected_collection
                .as_ref()
                .is_some_and(|c| c.name == collection)
    }

    pub(super) fn on_items_loaded(
        &mut self,
        client: &str,
        collection: &str,
        items: Vec<ItemStatus>,
        client_error: Option<TransferError>,
    ) -> Vec<Command> {
        if !self.is_current_listing(client, collection) {
            info!("Ignoring stale listing of {}/{}", client, collection);
            return Vec::new();
        }

        self.items.replace(items);

        let Some(error) = client_error else {
            return Vec::new();
        };
        warn!("Listing {} on {} failed: {}", collection, client, error);

        if error.session_class() == Some(ErrorClass::Auth)
            && self.forget_password(client)
            && self.mode() == Mode::Normal
        {
            let mut commands = self.set_error(format!("Authentication failed: {}", error));
            commands.extend(self.update(Msg::PasswordRequired {
                client: client.to_string(),
                action: PendingAction::LoadItems,
            }));
            return commands;
        }

        self.set_error(format!("Client error: {}", error))
    }

    pub(super) fn on_items_load_failed(
        &mut self,
        client: &str,
        collection: &str,
        error: String,
    ) -> Vec<Command> {
        if !self.is_current_listing(client, collection) {
            return Vec::new();
        }
        self.items.loading = false;
        self.set_error(format!("Listing {} failed: {}", collection, error))
    }
}
