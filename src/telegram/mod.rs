use command::{Command, command_handler};
use inline::inline_handler;
use message::message_handler;
use teloxide::{
    dispatching::{HandlerExt, UpdateFilterExt},
    dptree::{self, Handler},
    types::Update,
};

pub mod command;
pub mod inline;
pub mod message;

pub fn get_handler() -> Handler<
    'static,
    Result<(), teloxide::RequestError>,
    teloxide::dispatching::DpHandlerDescription,
> {
    let command_branch = Update::filter_message()
        .filter_command::<Command>()
        .endpoint(command_handler);

    let inline_branch = Update::filter_inline_query().endpoint(inline_handler);
    let message_branch = Update::filter_message().endpoint(message_handler);

    dptree::entry()
        .branch(command_branch)
        .branch(inline_branch)
        .branch(message_branch)
}
