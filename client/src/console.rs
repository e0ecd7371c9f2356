//! Console rendering and prompts.
//!
//! The one place that talks to stdout; the network pump calls these narrow
//! helpers and never formats game state itself.

use shared::cards::Card;
use shared::player::PlayerPublic;
use shared::protocol::LobbySummary;
use shared::score::GameOutcome;

pub fn help() {
    println!("commands:");
    println!("  list                        show open lobbies");
    println!("  create <name> [seats] [pw]  create a lobby (2-6 seats)");
    println!("  join <id> [pw]              join a lobby");
    println!("  leave                       leave the current lobby");
    println!("  close                       close the lobby you own");
    println!("  start                       start the game (owner only)");
    println!("  play <index>                play or discard a card from your hand");
    println!("  hand                        show your hand");
    println!("  quit                        disconnect and exit");
}

pub fn lobbies(lobbies: &[LobbySummary]) {
    if lobbies.is_empty() {
        println!("no open lobbies");
        return;
    }
    println!("open lobbies:");
    for lobby in lobbies {
        println!(
            "  #{} '{}' {}/{}{}",
            lobby.id,
            lobby.name,
            lobby.players,
            lobby.max_players,
            if lobby.private { " (private)" } else { "" }
        );
    }
}

pub fn hand(cards: &[Card]) {
    let rendered: Vec<String> = cards
        .iter()
        .enumerate()
        .map(|(index, card)| format!("{}:{}", index, card))
        .collect();
    println!("hand: {}", rendered.join(" "));
}

pub fn parade(cards: &[Card]) {
    let rendered: Vec<String> = cards.iter().map(Card::to_string).collect();
    println!("parade: {}", rendered.join(" "));
}

pub fn boards(players: &[PlayerPublic]) {
    for player in players {
        let rendered: Vec<String> = player.board.iter().map(Card::to_string).collect();
        println!("  {} ({} cards): {}", player.name, player.board.len(), rendered.join(" "));
    }
}

pub fn turn_banner(current_name: &str, own_turn: bool, deck_size: usize) {
    if own_turn {
        println!("-- your turn ({} cards left in the deck) --", deck_size);
        println!("play a card with: play <index>");
    } else {
        println!("-- {}'s turn ({} cards left in the deck) --", current_name, deck_size);
    }
}

pub fn scores(outcome: &GameOutcome, scores: &[(PlayerPublic, u32)]) {
    println!("=== game over ===");
    for (player, score) in scores {
        println!("  {}: {} points", player.name, score);
    }
    let name_of = |id: u32| {
        scores
            .iter()
            .find(|(p, _)| p.id == id)
            .map(|(p, _)| p.name.as_str())
            .unwrap_or("unknown")
    };
    match outcome {
        GameOutcome::Winner(id) => println!("{} wins!", name_of(*id)),
        GameOutcome::TiebreakWinner(id) => {
            println!("{} wins the tiebreak with fewer cards!", name_of(*id));
        }
        GameOutcome::Tie(ids) => {
            let names: Vec<&str> = ids.iter().map(|&id| name_of(id)).collect();
            println!("it's a tie between {}", names.join(" and "));
        }
    }
}

pub fn notice(text: &str) {
    println!("{}", text);
}
