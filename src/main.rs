use anyhow::Result;
use std::io::{self, Write};

use mai_tracker::config::Config;
use mai_tracker::telemetry::{MovementUpdate, TelemetryClient};

const CONFIG_PATH: &str = "config.toml";

fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH);

    println!("=== Mai Tracker - Telemetry Test ===");
    println!("送信先: {:?}", config.telemetry.targets);
    println!();
    println!("コマンド:");
    println!("  n <count>         - 人数を設定 (例: n 2)");
    println!("  m <t> <a> <l> <h> - 移動量を設定 (例: m 4.0 6.0 2.0 1.0)");
    println!("  s                 - 現在の値を送信");
    println!("  t                 - テスト送信 (移動量を少しずつ上げる)");
    println!("  q                 - 終了");
    println!();

    let client = TelemetryClient::new(&config.telemetry.targets)?;
    let mut update = MovementUpdate {
        person_count: 1,
        total_movement: 0.0,
        arm_movement: 0.0,
        leg_movement: 0.0,
        head_movement: 0.0,
    };

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let parts: Vec<&str> = input.trim().split_whitespace().collect();

        if parts.is_empty() {
            continue;
        }

        match parts[0] {
            "n" if parts.len() == 2 => {
                let count: i32 = parts[1].parse()?;
                update.person_count = count;
                println!("人数: {}", count);
                client.send(&update)?;
                println!("送信しました");
            }
            "m" if parts.len() == 5 => {
                let total: f32 = parts[1].parse()?;
                let arms: f32 = parts[2].parse()?;
                let legs: f32 = parts[3].parse()?;
                let head: f32 = parts[4].parse()?;
                update.total_movement = total;
                update.arm_movement = arms;
                update.leg_movement = legs;
                update.head_movement = head;
                println!("移動量: total={} arms={} legs={} head={}", total, arms, legs, head);
                client.send(&update)?;
                println!("送信しました");
            }
            "s" => {
                println!("現在の値:");
                println!("  人数: {}", update.person_count);
                println!(
                    "  移動量: total={} arms={} legs={} head={}",
                    update.total_movement,
                    update.arm_movement,
                    update.leg_movement,
                    update.head_movement
                );
                client.send(&update)?;
                println!("送信しました");
            }
            "t" => {
                println!("テスト送信中...");
                for i in 0..10 {
                    let v = i as f32 * 2.0;
                    update.total_movement = v;
                    update.arm_movement = v * 1.5;
                    update.leg_movement = v * 0.5;
                    update.head_movement = v * 0.25;
                    client.send(&update)?;
                    println!("  total = {}", v);
                    std::thread::sleep(std::time::Duration::from_millis(500));
                }
                println!("テスト完了");
            }
            "q" => {
                println!("終了します");
                break;
            }
            _ => {
                println!("不明なコマンド: {}", parts[0]);
            }
        }
    }

    Ok(())
}
