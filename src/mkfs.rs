/*
 * Copyright 2025 Luc Lenôtre
 *
 * This file is part of Maestro.
 *
 * Maestro is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * Maestro is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * Maestro. If not, see <https://www.gnu.org/licenses/>.
 */

//! The `mkfs-raidfs` tool creates a raidfs filesystem across a set of backing
//! disks.

use raidfs::format::{self, FormatOptions};
use raidfs::raid::RaidMode;
use std::env;
use std::path::PathBuf;
use std::process::exit;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
    /// If true, print command line help.
    help: bool,
    /// The RAID mode token.
    mode: Option<String>,
    /// The ordered list of backing disks.
    disks: Vec<PathBuf>,
    /// The number of inodes.
    inodes: Option<u64>,
    /// The number of data blocks.
    blocks: Option<u64>,
}

/// Parses command line arguments, returning `None` on a malformed command
/// line.
fn parse_args() -> Option<Args> {
    let mut res: Args = Default::default();
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => res.help = true,
            "-r" => res.mode = Some(iter.next()?),
            "-d" => res.disks.push(PathBuf::from(iter.next()?)),
            "-i" => res.inodes = Some(iter.next()?.parse().ok()?),
            "-b" => res.blocks = Some(iter.next()?.parse().ok()?),
            _ => return None,
        }
    }
    Some(res)
}

/// Prints command usage.
fn print_usage() {
    eprintln!("mkfs-raidfs: bad usage");
    eprintln!("Try 'mkfs-raidfs --help' for more information.");
}

/// Prints command help.
fn print_help() {
    println!();
    println!("Usage:");
    println!(" mkfs-raidfs -r <mode> -d <disk> -d <disk> [-d <disk>...] -i <inodes> -b <blocks>");
    println!();
    println!("Creates a raidfs filesystem across the given backing disks.");
    println!();
    println!("Options:");
    println!(" -h, --help\tPrints help.");
    println!(" -r <mode>\tRAID mode: 0 (stripe), 1 (mirror) or 1v (verified mirror).");
    println!(" -d <disk>\tAdds a backing disk. At least two are required.");
    println!(" -i <inodes>\tNumber of inodes, rounded up to a multiple of 32.");
    println!(" -b <blocks>\tNumber of data blocks, rounded up to a multiple of 32.");
}

fn main() {
    let Some(args) = parse_args() else {
        print_usage();
        exit(1);
    };
    if args.help {
        print_help();
        exit(0);
    }
    let Some(token) = args.mode else {
        eprintln!("mkfs-raidfs: missing RAID mode");
        exit(1);
    };
    let Ok(mode) = RaidMode::from_token(&token) else {
        eprintln!("mkfs-raidfs: invalid RAID mode `{token}`");
        exit(1);
    };
    if args.disks.len() < 2 {
        eprintln!("mkfs-raidfs: at least two disks are required");
        exit(1);
    }
    let (Some(num_inodes), Some(num_data_blocks)) = (args.inodes, args.blocks) else {
        eprintln!("mkfs-raidfs: missing inode or data block count");
        exit(1);
    };
    if num_inodes == 0 || num_data_blocks == 0 {
        eprintln!("mkfs-raidfs: inode and data block counts must be positive");
        exit(1);
    }
    let opts = FormatOptions {
        mode,
        num_inodes,
        num_data_blocks,
    };
    if let Err(e) = format::format(&args.disks, &opts) {
        eprintln!("mkfs-raidfs: failed to create filesystem: {e}");
        exit(-1);
    }
}
