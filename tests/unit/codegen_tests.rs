use coredata_model::{GeneratedFile, generate_headers};

use crate::common::fixtures::MUSIC_LIBRARY;
use crate::common::test_helpers::parse;

fn header<'a>(files: &'a [GeneratedFile], name: &str) -> &'a str {
    &files
        .iter()
        .find(|f| f.name == name)
        .unwrap_or_else(|| panic!("missing {name}"))
        .contents
}

#[test]
fn test_headers_named_after_classes() {
    let files = generate_headers(&parse(MUSIC_LIBRARY).model);
    let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Media.h",
            "SongMO.h",
            "AlbumMO.h",
            "ModelUtilities-Generated.swift",
            "Model-All.h",
            "JOManagedObject.h"
        ]
    );

    let umbrella = header(&files, "Model-All.h");
    assert!(umbrella.contains("#import \"Media.h\"\n#import \"SongMO.h\"\n#import \"AlbumMO.h\"\n"));
}

#[test]
fn test_song_header() {
    let files = generate_headers(&parse(MUSIC_LIBRARY).model);
    let song = header(&files, "SongMO.h");

    assert!(song.contains("#import \"Media.h\""));
    assert!(song.contains("@class AlbumMO;"));
    assert!(song.contains("@interface SongMO : Media"));
    assert!(song.contains("@property (nullable, nonatomic, retain) AlbumMO *album;"));
    assert!(song.contains("@property (nullable, nonatomic, retain) NSImage *artwork;"));
    assert!(song.contains("@property (nonatomic) int32_t plays;"));
    assert!(song.contains("@property (nonatomic) double rating;"));
    assert!(song.contains("@property (nonatomic) BOOL explicit;"));
    assert!(!song.contains("cachedLength"));
    // inherited attributes live in the parent header
    assert!(!song.contains("title"));
}

#[test]
fn test_album_header_has_ordered_accessors() {
    let files = generate_headers(&parse(MUSIC_LIBRARY).model);
    let album = header(&files, "AlbumMO.h");

    assert!(album.contains("#import \"JOManagedObject.h\""));
    assert!(album.contains("@interface AlbumMO : JOManagedObject"));
    assert!(album.contains("@property (nullable, nonatomic, retain) NSOrderedSet<SongMO *> *songs;"));
    assert!(album.contains("- (void)addSongs:(NSOrderedSet<SongMO *> *)values;"));
    assert!(album.contains("- (void)removeSongs:(NSOrderedSet<SongMO *> *)values;"));
    assert!(album.contains("@dynamic name;\n@dynamic songs;"));

    let media = header(&files, "Media.h");
    assert!(media.contains("@property (nonatomic, retain) NSDate *added;"));
    assert!(!media.contains("CoreDataGeneratedAccessors"));
}

#[test]
fn test_base_class_header() {
    let files = generate_headers(&parse(MUSIC_LIBRARY).model);
    let base = header(&files, "JOManagedObject.h");
    assert!(base.contains("#import <CoreData/CoreData.h>"));
    assert!(base.contains("@interface JOManagedObject : NSManagedObject\n@end"));
    assert!(base.contains("@implementation JOManagedObject\n@end"));

    // subentities keep their parent class
    assert!(!header(&files, "SongMO.h").contains("JOManagedObject"));
}

#[test]
fn test_swift_companion_keys_every_entity() {
    let files = generate_headers(&parse(MUSIC_LIBRARY).model);
    let swift = header(&files, "ModelUtilities-Generated.swift");

    for class in [
        "MediaProperties",
        "MediaAttributes",
        "MediaRelationships",
        "SongProperties",
        "SongAttributes",
        "SongRelationships",
        "AlbumProperties",
        "AlbumAttributes",
        "AlbumRelationships",
    ] {
        assert!(swift.contains(&format!("@objc class {class}: NSObject {{")), "missing {class}");
    }
    assert!(swift.contains(
        "    class var songs: CoreDataRelationship { return CoreDataRelationship(key: \"songs\", toMany: true) }"
    ));
    assert!(swift.contains("    class var cachedLength: String { return \"cachedLength\" }"));

    assert!(swift.contains("extension Media: CoreDataEntity {"));
    assert!(swift.contains("extension AlbumMO: CoreDataEntity {"));
    assert!(swift.contains("extension SongMO {\n    override class func entityName() -> String { return \"Song\" }"));
    assert!(swift.contains(
        "class func properties() -> [CoreDataProperty] { return [MediaProperties.added, MediaProperties.title] }"
    ));
}
