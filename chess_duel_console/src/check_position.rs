use std::io;

use chess_duel::rules::{ChessRulesEngine, RulesEngine};


pub fn run(fen: &str) -> io::Result<()> {
    match ChessRulesEngine::with_starting_position(fen) {
        Ok(rules) => {
            let position = rules.initial_position();
            println!("OK: {} to move", rules.whose_turn(&position).name());
            Ok(())
        }
        Err(err) => {
            eprintln!("Rejected: {}", err);
            Err(io::Error::from(io::ErrorKind::InvalidData))
        }
    }
}
