use actix::Addr;
use colored::Color;
use common::logger::Logger;
use common::messages::session_messages::{
    ArrivedAtShop, CompleteOrder, ConfirmPickup, DeclineOffer, SendChatMessage, SetVehicle,
    ToggleOnline,
};
use common::types::vehicle::VehicleType;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::driver_actors::session::DriverSession;
use crate::messages::internal_messages::{AcceptOfferCommand, ShowStatus};

/// Stdin command loop of the driver console. Runs as its own task so the
/// arbiter keeps servicing session timers while the prompt sits idle.
pub fn spawn_console(session: Addr<DriverSession>) {
    let logger = Logger::new("Console", Color::Green);
    actix::spawn(async move {
        print_help(&logger);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            handle_command(line.trim(), &session, &logger);
        }
    });
}

fn print_help(logger: &Logger) {
    logger.info(
        "Commands: on | off | vehicle <bike|car|scooter> | accept <id> | decline <id> \
         | arrived | pickup | complete | msg <text> | status | help",
    );
}

fn handle_command(line: &str, session: &Addr<DriverSession>, logger: &Logger) {
    let (command, rest) = match line.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    match command {
        "" => {}
        "on" | "off" => session.do_send(ToggleOnline),
        "vehicle" => match parse_vehicle(rest) {
            Some(vehicle) => session.do_send(SetVehicle { vehicle }),
            None => logger.warn("Unknown vehicle. Options: bike, car, scooter."),
        },
        "accept" if !rest.is_empty() => session.do_send(AcceptOfferCommand {
            request_id: rest.to_string(),
        }),
        "decline" if !rest.is_empty() => session.do_send(DeclineOffer {
            request_id: rest.to_string(),
        }),
        "arrived" => session.do_send(ArrivedAtShop),
        "pickup" => session.do_send(ConfirmPickup),
        "complete" => session.do_send(CompleteOrder),
        "msg" if !rest.is_empty() => session.do_send(SendChatMessage {
            body: rest.to_string(),
        }),
        "status" => session.do_send(ShowStatus),
        "help" => print_help(logger),
        _ => logger.warn(format!("Unknown command: {}. Type `help` for the list.", line)),
    }
}

fn parse_vehicle(raw: &str) -> Option<VehicleType> {
    match raw.to_lowercase().as_str() {
        "bike" => Some(VehicleType::Bike),
        "car" => Some(VehicleType::Car),
        "scooter" => Some(VehicleType::Scooter),
        _ => None,
    }
}
