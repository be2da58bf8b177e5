use std::io::Cursor;

use hevc_cabac::{BitWriter, CabacReader, CabacWriter, H265Context, H265Reader, H265Writer};

fn pattern(i: u32) -> bool {
    i % 111 == 0
}

const LOOP: u32 = 100 * 1024;

fn encode(body: impl FnOnce(&mut H265Writer<BitWriter<Vec<u8>>>)) -> Vec<u8> {
    let mut writer = H265Writer::new(BitWriter::new(Vec::with_capacity(1000)), 1);
    body(&mut writer);

    writer.put_terminate(true).unwrap();
    writer.finish().unwrap();
    writer.get_mut().put_trailing_bits().unwrap();
    writer.into_inner().into_inner()
}

fn norm_h265(print: bool) {
    let output = encode(|writer| {
        for i in 0..LOOP {
            writer.encode_bin(0, pattern(i)).unwrap();
        }
    });

    {
        let mut reader = H265Reader::new(Cursor::new(&output)).unwrap();
        let mut context = H265Context::default();
        for i in 0..LOOP {
            assert_eq!(reader.get(&mut context).unwrap(), pattern(i));
        }
    }

    if print {
        println!("norm_h265 = {0}", output.len() * 8);
    }
}

fn bypass_h265(print: bool) {
    let output = encode(|writer| {
        for i in 0..LOOP {
            writer.put_bypass(pattern(i)).unwrap();
        }
    });

    {
        let mut reader = H265Reader::new(Cursor::new(&output)).unwrap();
        for i in 0..LOOP {
            assert_eq!(reader.get_bypass().unwrap(), pattern(i));
        }
    }

    if print {
        println!("bypass_h265 = {0}", output.len() * 8);
    }
}

fn count_h265(print: bool) {
    let mut counter = H265Writer::new(BitWriter::new(Vec::new()), 1).counting_fork();
    for i in 0..LOOP {
        counter.encode_bin(0, pattern(i)).unwrap();
    }

    if print {
        println!("count_h265 = {0}", counter.bits_counted());
    }
}

fn main() {
    for i in 0..1024 {
        bypass_h265(i == 1023);
        norm_h265(i == 1023);
        count_h265(i == 1023);
    }
}
