//! Join plays with user profiles and count plays per country
use tuplestream::operators::*;
use tuplestream::sinks::StdOutSink;
use tuplestream::sources::TupleSource;
use tuplestream::stream::Pipeline;
use tuplestream::tuple;

fn main() {
    tracing_subscriber::fmt::init();

    let pipeline = Pipeline::new();
    let plays = pipeline
        .source(
            "plays",
            TupleSource::infer(vec![
                tuple! {"user" => "ada", "song" => "intro"},
                tuple! {"user" => "bob", "song" => "intro"},
                tuple! {"user" => "ada", "song" => "outro"},
                tuple! {"user" => "eve", "song" => "intro"},
            ]),
        )
        .unwrap();
    let users = pipeline
        .source(
            "users",
            TupleSource::infer(vec![
                tuple! {"user" => "ada", "country" => "de"},
                tuple! {"user" => "bob", "country" => "ch"},
            ]),
        )
        .unwrap();

    plays
        .join(
            "with-profile",
            users,
            JoinSpec::builder()
                .left_on("user")
                .right_on("user")
                .mode(JoinMode::LeftOuter)
                .build(),
        )
        .unwrap()
        .group_by("per-country", "country")
        .unwrap()
        .reduce("plays", Reduction::Commutative, Group::count)
        .unwrap()
        .write("print", StdOutSink)
        .unwrap();
}
