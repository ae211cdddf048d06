//! Sharing two TCP connections between ten client threads

use esox_resourcepool::{Pool, PoolConfig};
use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::thread;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== esox_resourcepool - TCP Example ===\n");

    let addr = echo_server()?;
    println!("Echo server listening on {addr}");

    let pool = Pool::new(
        PoolConfig::new()
            .with_initial_size(1)
            .with_max_open(2)
            .with_factory(move || TcpStream::connect(addr))
            .with_closer(|stream: TcpStream| stream.shutdown(Shutdown::Both)),
    )?;
    println!("Pool ready: {:?}\n", pool.status());

    let clients: Vec<_> = (0..10)
        .map(|num| {
            let pool = pool.clone();
            thread::spawn(move || client(num, &pool))
        })
        .collect();
    for client in clients {
        if let Err(err) = client.join().expect("client thread panicked") {
            println!("client failed: {err}");
        }
    }

    let status = pool.status();
    println!("\nAfter clients: open={} idle={}", status.num_open, status.idle);
    println!("Shutting down pool...");
    pool.shutdown()?;
    println!("Done");
    Ok(())
}

fn client(num: usize, pool: &Pool<TcpStream>) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    println!("num: {num} get()");
    let mut stream = pool.get()?;
    println!("num: {num} got connection {}", stream.local_addr()?);

    let reply = match echo(&mut stream, num) {
        Ok(reply) => reply,
        Err(err) => {
            // a broken connection is not worth pooling
            pool.discard(stream)?;
            return Err(err.into());
        }
    };
    println!("num: {num} echoed {reply:?}");

    println!("num: {num} put()");
    pool.put(stream)?;
    Ok(())
}

fn echo(stream: &mut TcpStream, num: usize) -> io::Result<String> {
    writeln!(stream, "hello from {num}")?;
    let mut reply = String::new();
    BufReader::new(&*stream).read_line(&mut reply)?;
    Ok(reply.trim_end().to_string())
}

/// Line echo server on an ephemeral port, one thread per connection
fn echo_server() -> io::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    thread::spawn(move || {
        for conn in listener.incoming() {
            let Ok(conn) = conn else { continue };
            thread::spawn(move || {
                let Ok(mut writer) = conn.try_clone() else { return };
                for line in BufReader::new(conn).lines() {
                    let Ok(line) = line else { break };
                    if writeln!(writer, "{line}").is_err() {
                        break;
                    }
                }
            });
        }
    });
    Ok(addr)
}
