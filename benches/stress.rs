use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio_postgres::{Client, Config, NoTls, SimpleQueryMessage};

/// Hourly slots clear of the default maintenance windows.
const SLOTS: [(&str, &str); 10] = [
    ("10:00", "11:00"),
    ("11:00", "12:00"),
    ("12:00", "13:00"),
    ("14:00", "15:00"),
    ("15:00", "16:00"),
    ("16:00", "17:00"),
    ("18:00", "19:00"),
    ("19:00", "20:00"),
    ("20:00", "21:00"),
    ("21:00", "22:00"),
];

async fn connect(host: &str, port: u16) -> Client {
    let mut config = Config::new();
    config.host(host).port(port).dbname("roomalloc").user("roomalloc");

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

fn insert_sql(start: &str, end: &str, people: u32) -> String {
    format!(r#"INSERT INTO bookings (start, "end", people) VALUES ('{start}', '{end}', {people})"#)
}

/// Book and return the new id, or None when the request was turned away.
async fn book(client: &Client, start: &str, end: &str, people: u32) -> Option<u64> {
    let messages = client.simple_query(&insert_sql(start, end, people)).await.ok()?;
    messages.iter().find_map(|m| match m {
        SimpleQueryMessage::Row(row) => row.get("id").and_then(|id| id.parse().ok()),
        _ => None,
    })
}

async fn room_names(client: &Client) -> Vec<String> {
    client
        .simple_query("SELECT * FROM rooms")
        .await
        .unwrap()
        .iter()
        .filter_map(|m| match m {
            SimpleQueryMessage::Row(row) => row.get("name").map(str::to_string),
            _ => None,
        })
        .collect()
}

async fn phase1_sequential(host: &str, port: u16) {
    let client = connect(host, port).await;
    client.batch_execute("DELETE FROM bookings").await.unwrap();

    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let (s, e) = SLOTS[i % SLOTS.len()];
        let t = Instant::now();
        let id = book(&client, s, e, 2).await.expect("sequential booking rejected");
        latencies.push(t.elapsed());
        client
            .batch_execute(&format!("DELETE FROM bookings WHERE id = {id}"))
            .await
            .unwrap();
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} book/delete cycles in {:.2}s = {ops:.0} cycles/sec", elapsed.as_secs_f64());
    print_latency("allocation latency", &mut latencies);
}

/// Many clients race for the same slots. Each room can hold one booking per
/// slot, so the number of winners is fixed and no room may be double-booked.
async fn phase2_contention(host: &str, port: u16) {
    let admin = connect(host, port).await;
    admin.batch_execute("DELETE FROM bookings").await.unwrap();
    let rooms = room_names(&admin).await;

    let n_tasks = 20;
    let won = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..n_tasks {
        let host = host.to_string();
        let won = won.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            for (s, e) in SLOTS {
                if book(&client, s, e, 2).await.is_some() {
                    won.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let won = won.load(Ordering::Relaxed);
    let expected = rooms.len() * SLOTS.len();
    println!(
        "  {n_tasks} clients x {} slots: {won} bookings won (expected {expected}) in {:.2}s",
        SLOTS.len(),
        elapsed.as_secs_f64()
    );
    assert_eq!(won, expected, "winner count does not match room capacity");

    for room in &rooms {
        let messages = admin
            .simple_query(&format!("SELECT * FROM bookings WHERE room = '{room}'"))
            .await
            .unwrap();
        let mut spans: Vec<(String, String)> = messages
            .iter()
            .filter_map(|m| match m {
                SimpleQueryMessage::Row(row) => Some((
                    row.get("start").unwrap_or_default().to_string(),
                    row.get("end").unwrap_or_default().to_string(),
                )),
                _ => None,
            })
            .collect();
        spans.sort();
        for pair in spans.windows(2) {
            // HH:MM strings order the same as the times they name.
            assert!(pair[0].1 <= pair[1].0, "double booking in {room}: {pair:?}");
        }
    }
    println!("  no double bookings across {} rooms", rooms.len());
}

async fn phase3_read_under_load(host: &str, port: u16) {
    let setup = connect(host, port).await;
    setup.batch_execute("DELETE FROM bookings").await.unwrap();
    drop(setup);

    // Writers keep booking and releasing slots in the background.
    let stop = Arc::new(AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for w in 0..4 {
        let host = host.to_string();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let mut i = w;
            while !stop.load(Ordering::Relaxed) {
                let (s, e) = SLOTS[i % SLOTS.len()];
                if let Some(id) = book(&client, s, e, 2).await {
                    let _ = client
                        .batch_execute(&format!("DELETE FROM bookings WHERE id = {id}"))
                        .await;
                }
                i += 1;
            }
        }));
    }

    let n_readers = 10;
    let reads_per_reader = 500;
    let mut reader_handles = Vec::new();

    for r in 0..n_readers {
        let host = host.to_string();
        reader_handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for i in 0..reads_per_reader {
                let (s, e) = SLOTS[(r + i) % SLOTS.len()];
                let t = Instant::now();
                client
                    .simple_query(&format!(
                        r#"SELECT * FROM availability WHERE start >= '{s}' AND "end" <= '{e}'"#
                    ))
                    .await
                    .unwrap();
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.unwrap());
    }

    stop.store(true, Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("availability query", &mut all_latencies);
}

async fn phase4_connection_storm(host: &str, port: u16) {
    let n_conns = 50;
    let ops_per_conn = 10;

    let start = Instant::now();
    let mut handles = Vec::new();
    let success = Arc::new(AtomicUsize::new(0));

    for _ in 0..n_conns {
        let host = host.to_string();
        let success = success.clone();
        handles.push(tokio::spawn(async move {
            let client = connect(&host, port).await;
            for _ in 0..ops_per_conn {
                client.simple_query("SELECT * FROM rooms").await.unwrap();
            }
            success.fetch_add(1, Ordering::Relaxed);
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    let elapsed = start.elapsed();
    let ok = success.load(Ordering::Relaxed);
    println!(
        "  {n_conns} connections, {ops_per_conn} ops each: {ok}/{n_conns} succeeded in {:.2}s",
        elapsed.as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    let host = std::env::var("ROOMALLOC_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("ROOMALLOC_PORT")
        .unwrap_or_else(|_| "5434".into())
        .parse()
        .expect("invalid ROOMALLOC_PORT");

    println!("=== roomalloc stress benchmark ===");
    println!("target: {host}:{port}\n");

    println!("[phase 1] sequential allocation throughput");
    phase1_sequential(&host, port).await;

    println!("\n[phase 2] contention for shared slots");
    phase2_contention(&host, port).await;

    println!("\n[phase 3] read latency under write load");
    phase3_read_under_load(&host, port).await;

    println!("\n[phase 4] connection storm");
    phase4_connection_storm(&host, port).await;

    println!("\n=== benchmark complete ===");
}
